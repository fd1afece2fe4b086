//! Prometheus metrics registry for the food alerts bot.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the poller and the optional HTTP surface.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`) when a metrics port is configured.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use prometheus::{Counter, Gauge, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Total number of poll ticks started.
    pub ticks_total: Counter,
    /// Ticks aborted by a fetch or checkpoint failure.
    pub tick_errors_total: Counter,
    /// Alerts returned by the feed across all ticks.
    pub alerts_fetched_total: Counter,
    /// Alerts successfully posted.
    pub alerts_published_total: Counter,
    /// Alerts skipped for an unparsable date or because they were already processed.
    pub alerts_skipped_total: Counter,
    /// Publish attempts rejected by the social network.
    pub publish_failures_total: Counter,
    /// Current checkpoint as Unix seconds. Set through [`AppMetrics::record_checkpoint`].
    pub checkpoint_timestamp: Gauge,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
    /// Full-precision value behind `checkpoint_timestamp`.
    last_checkpoint: RwLock<Option<DateTime<Utc>>>,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ticks_total = Counter::with_opts(Opts::new(
            "food_alerts_bot_ticks_total",
            "Total poll ticks started",
        ))?;

        let tick_errors_total = Counter::with_opts(Opts::new(
            "food_alerts_bot_tick_errors_total",
            "Poll ticks aborted by an error",
        ))?;

        let alerts_fetched_total = Counter::with_opts(Opts::new(
            "food_alerts_bot_alerts_fetched_total",
            "Alerts returned by the feed",
        ))?;

        let alerts_published_total = Counter::with_opts(Opts::new(
            "food_alerts_bot_alerts_published_total",
            "Alerts posted to the social network",
        ))?;

        let alerts_skipped_total = Counter::with_opts(Opts::new(
            "food_alerts_bot_alerts_skipped_total",
            "Alerts skipped as invalid or already processed",
        ))?;

        let publish_failures_total = Counter::with_opts(Opts::new(
            "food_alerts_bot_publish_failures_total",
            "Rejected publish attempts",
        ))?;

        let checkpoint_timestamp = Gauge::with_opts(Opts::new(
            "food_alerts_bot_checkpoint_timestamp_seconds",
            "Current checkpoint as Unix seconds",
        ))?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(tick_errors_total.clone()))?;
        registry.register(Box::new(alerts_fetched_total.clone()))?;
        registry.register(Box::new(alerts_published_total.clone()))?;
        registry.register(Box::new(alerts_skipped_total.clone()))?;
        registry.register(Box::new(publish_failures_total.clone()))?;
        registry.register(Box::new(checkpoint_timestamp.clone()))?;

        Ok(Self {
            ticks_total,
            tick_errors_total,
            alerts_fetched_total,
            alerts_published_total,
            alerts_skipped_total,
            publish_failures_total,
            checkpoint_timestamp,
            registry,
            last_checkpoint: RwLock::new(None),
        })
    }

    /// Publish a new checkpoint: the gauge gets whole seconds, `/health`
    /// gets the exact instant.
    pub fn record_checkpoint(&self, at: DateTime<Utc>) {
        self.checkpoint_timestamp.set(at.timestamp() as f64);
        let mut last = self
            .last_checkpoint
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(at);
    }

    pub fn last_checkpoint(&self) -> Option<DateTime<Utc>> {
        *self
            .last_checkpoint
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_register_without_error() {
        let metrics = AppMetrics::new();
        assert!(metrics.is_ok(), "AppMetrics::new() failed: {:?}", metrics.err());
    }

    #[test]
    fn render_contains_every_metric_name() {
        let metrics = AppMetrics::new().unwrap();
        metrics.ticks_total.inc();
        let output = metrics.render().unwrap();

        for name in [
            "food_alerts_bot_ticks_total",
            "food_alerts_bot_tick_errors_total",
            "food_alerts_bot_alerts_fetched_total",
            "food_alerts_bot_alerts_published_total",
            "food_alerts_bot_alerts_skipped_total",
            "food_alerts_bot_publish_failures_total",
            "food_alerts_bot_checkpoint_timestamp_seconds",
        ] {
            assert!(output.contains(name), "missing {name}");
        }
    }

    #[test]
    fn counters_increment_correctly() {
        let metrics = AppMetrics::new().unwrap();
        metrics.alerts_published_total.inc_by(3.0);
        metrics.publish_failures_total.inc();
        assert!((metrics.alerts_published_total.get() - 3.0).abs() < f64::EPSILON);
        assert!((metrics.publish_failures_total.get() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn record_checkpoint_sets_gauge_and_keeps_exact_value() {
        use chrono::TimeZone;

        let metrics = AppMetrics::new().unwrap();
        assert_eq!(metrics.last_checkpoint(), None);

        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        metrics.record_checkpoint(at);

        assert!((metrics.checkpoint_timestamp.get() - 1_704_153_600.0).abs() < f64::EPSILON);
        assert_eq!(metrics.last_checkpoint(), Some(at));
    }
}
