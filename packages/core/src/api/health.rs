use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::checkpoint::format_timestamp;
use crate::metrics::AppMetrics;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub ticks: u64,
    pub tick_errors: u64,
    /// Exact checkpoint, formatted as persisted. `None` until one is known.
    pub checkpoint: Option<String>,
}

impl HealthReport {
    pub fn from_metrics(metrics: &AppMetrics) -> Self {
        Self {
            status: "ok",
            ticks: metrics.ticks_total.get() as u64,
            tick_errors: metrics.tick_errors_total.get() as u64,
            checkpoint: metrics.last_checkpoint().map(format_timestamp),
        }
    }
}

pub fn health(metrics: &AppMetrics) -> Response {
    let mut response = Json(HealthReport::from_metrics(metrics)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
