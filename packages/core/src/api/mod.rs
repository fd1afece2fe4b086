//! Operational HTTP surface: `GET /health` and `GET /metrics`.

pub mod health;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::metrics::AppMetrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Build the router served on the metrics port.
pub fn router(metrics: Arc<AppMetrics>) -> Router {
    Router::new()
        .route("/health", {
            let metrics = metrics.clone();
            get(move || {
                let metrics = metrics.clone();
                async move { health::health(&metrics) }
            })
        })
        .route(
            "/metrics",
            get(move || {
                let metrics = metrics.clone();
                async move { render_metrics(&metrics) }
            }),
        )
}

fn render_metrics(metrics: &AppMetrics) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, Body::from("metrics error")).into_response()
        }
    }
}

/// Serve the router until `shutdown` flips to `true`.
pub async fn serve(
    port: u16,
    metrics: Arc<AppMetrics>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Metrics listening on {}", listener.local_addr()?);

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}
