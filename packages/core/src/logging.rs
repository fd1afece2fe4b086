use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging for the application.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug`
/// when the bot runs in diagnostic mode.
///
/// This must be called once at startup (in main.rs).
pub fn init_logging(debug_mode: bool) {
    let default_level = if debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Logging initialized");
}
