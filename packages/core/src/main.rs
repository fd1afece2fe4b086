use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::signal;
use tokio::sync::watch;

use food_alerts_bot::api;
use food_alerts_bot::checkpoint::{format_timestamp, CheckpointStore, FileCheckpointStore};
use food_alerts_bot::cli::Cli;
use food_alerts_bot::config::Config;
use food_alerts_bot::error::AppError;
use food_alerts_bot::logging::init_logging;
use food_alerts_bot::metrics::AppMetrics;
use food_alerts_bot::scheduler::{AlertPoller, PollSettings};
use food_alerts_bot::services::bluesky::BlueskyClient;
use food_alerts_bot::services::food_alerts::FoodAlertsClient;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();

    let debug_hint = cli.debug || std::env::var("DEBUG_MODE").as_deref() == Ok("true");
    init_logging(debug_hint);

    if let Err(err) = run(cli).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

/// Everything that can fail here is a startup error; once the poller
/// runs, failures are handled per tick and never end the process.
async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()
        .and_then(|config| config.with_cli(&cli))
        .map_err(AppError::Config)?;

    tracing::info!("Service started with config: {:?}", config);
    if config.debug_mode {
        tracing::debug!("Starting the food alerts bot in debug mode");
    }

    let publisher = BlueskyClient::login(
        &config.bluesky_service_url,
        &config.bluesky_identifier,
        &config.bluesky_password,
        config.request_timeout(),
    )
    .await?;

    let checkpoints = FileCheckpointStore::new(
        config.checkpoint_file.clone(),
        config.debug_mode,
        config.lookback(),
    );
    let initial_checkpoint = checkpoints.read()?;
    tracing::info!(
        "Starting from checkpoint {} ({})",
        format_timestamp(initial_checkpoint),
        checkpoints.path().display()
    );

    let source = FoodAlertsClient::new(config.food_alerts_url.clone(), config.request_timeout())?;

    let metrics = Arc::new(
        AppMetrics::new()
            .map_err(|err| AppError::Config(format!("metrics registry: {}", err)))?,
    );
    metrics.record_checkpoint(initial_checkpoint);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl+C received, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    if let Some(port) = config.metrics_port {
        let metrics = metrics.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(err) = api::serve(port, metrics, shutdown).await {
                tracing::error!("Metrics server failed: {}", err);
            }
        });
    }

    let poller = AlertPoller::new(
        Arc::new(source),
        Arc::new(publisher),
        Arc::new(checkpoints),
        metrics,
        PollSettings::from(&config),
    );
    poller
        .run(initial_checkpoint, config.poll_interval(), shutdown_rx)
        .await;

    Ok(())
}
