//! Alert polling scheduler.
//!
//! Drives the main loop: each tick fetches alerts modified since the
//! checkpoint, walks them oldest-first, persists the checkpoint for each
//! valid alert and then posts it (or only logs it in diagnostic mode),
//! pausing between posts to stay under the social network's rate limits.
//!
//! The checkpoint is not global state. [`AlertPoller::poll_once`] takes the
//! current [`Checkpoint`] and hands the new one back in its [`TickOutcome`];
//! [`AlertPoller::run`] threads it from tick to tick. Along with the instant
//! it carries the alerts already handled at that instant, so several alerts
//! sharing one `modified` value are each processed exactly once.
//!
//! Ordering policy: the checkpoint is written *before* the publish call.
//! A crash or a rejected post after the write means that alert is never
//! posted (at-most-once); no alert is ever posted twice by a restart.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::alerts::{Alert, AlertsSource};
use crate::checkpoint::{format_timestamp, Checkpoint, CheckpointStore};
use crate::config::Config;
use crate::error::AppError;
use crate::metrics::AppMetrics;
use crate::publish::Publisher;

/// Per-tick behaviour knobs.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Diagnostic mode: never publish, only log would-be posts.
    pub debug_mode: bool,
    /// Feed items requested per tick.
    pub item_limit: u32,
    /// Pause after each publish attempt.
    pub post_spacing: Duration,
}

impl From<&Config> for PollSettings {
    fn from(config: &Config) -> Self {
        Self {
            debug_mode: config.debug_mode,
            item_limit: config.item_limit(),
            post_spacing: config.post_spacing(),
        }
    }
}

/// What a single tick did.
#[derive(Debug)]
pub struct TickOutcome {
    /// Checkpoint after the tick; pass it to the next tick.
    pub checkpoint: Checkpoint,
    pub fetched: usize,
    pub published: usize,
    /// Valid alerts logged instead of posted (diagnostic mode).
    pub suppressed: usize,
    /// Alerts with an unparsable date or already behind the checkpoint.
    pub skipped: usize,
    pub publish_failures: usize,
    /// Shutdown was requested before the tick finished.
    pub interrupted: bool,
    /// Fetch or checkpoint failure that aborted the tick.
    pub error: Option<AppError>,
}

impl TickOutcome {
    fn starting_at(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint,
            fetched: 0,
            published: 0,
            suppressed: 0,
            skipped: 0,
            publish_failures: 0,
            interrupted: false,
            error: None,
        }
    }
}

pub struct AlertPoller {
    source: Arc<dyn AlertsSource + Send + Sync>,
    publisher: Arc<dyn Publisher + Send + Sync>,
    checkpoints: Arc<dyn CheckpointStore + Send + Sync>,
    metrics: Arc<AppMetrics>,
    settings: PollSettings,
}

impl AlertPoller {
    pub fn new(
        source: Arc<dyn AlertsSource + Send + Sync>,
        publisher: Arc<dyn Publisher + Send + Sync>,
        checkpoints: Arc<dyn CheckpointStore + Send + Sync>,
        metrics: Arc<AppMetrics>,
        settings: PollSettings,
    ) -> Self {
        Self {
            source,
            publisher,
            checkpoints,
            metrics,
            settings,
        }
    }

    /// Run the polling loop.
    ///
    /// The first tick fires immediately, then one every `poll_interval`.
    /// A tick always runs to completion before the next may start; an
    /// overrunning tick delays the schedule instead of causing a burst.
    /// Errors are logged inside the tick and never stop the loop.
    ///
    /// Runs until `shutdown` flips to `true`, then returns the last checkpoint.
    pub async fn run(
        self,
        initial_checkpoint: DateTime<Utc>,
        poll_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> DateTime<Utc> {
        let mut interval = time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut idle_shutdown = shutdown.clone();
        let mut checkpoint = Checkpoint::restored(initial_checkpoint);

        tracing::info!(
            "Alert polling started (interval: {}s, source: {}, debug: {})",
            poll_interval.as_secs(),
            self.source.source_name(),
            self.settings.debug_mode,
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = self.poll_once(checkpoint, &mut shutdown).await;
                    checkpoint = outcome.checkpoint;
                    if outcome.interrupted {
                        break;
                    }
                }

                _ = wait_for_shutdown(&mut idle_shutdown) => {
                    tracing::info!("Shutdown signal received. Stopping polling.");
                    break;
                }
            }
        }

        tracing::info!(
            "Alert polling stopped cleanly at checkpoint {}",
            format_timestamp(checkpoint.at())
        );
        checkpoint.at()
    }

    /// Execute a single tick starting from `checkpoint`.
    ///
    /// A bare timestamp converts into a restored [`Checkpoint`].
    pub async fn poll_once(
        &self,
        checkpoint: impl Into<Checkpoint>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> TickOutcome {
        self.metrics.ticks_total.inc();
        let mut outcome = TickOutcome::starting_at(checkpoint.into());
        let since = outcome.checkpoint.at();

        tracing::info!("Fetching new items since {}", format_timestamp(since));
        let mut alerts = match self
            .source
            .list_since(since, self.settings.item_limit)
            .await
        {
            Ok(alerts) => alerts,
            Err(err) => {
                tracing::error!("Alert fetch failed, skipping tick: {}", err);
                self.metrics.tick_errors_total.inc();
                outcome.error = Some(err);
                return outcome;
            }
        };

        outcome.fetched = alerts.len();
        self.metrics.alerts_fetched_total.inc_by(alerts.len() as f64);
        tracing::info!("Fetched {} new items", alerts.len());

        // The feed is newest-first.
        alerts.reverse();

        for alert in alerts {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, leaving tick early");
                outcome.interrupted = true;
                break;
            }

            let modified = match alert.modified_at() {
                Ok(modified) => modified,
                Err(err) => {
                    tracing::warn!("Skipping alert '{}': {}", alert.title, err);
                    self.skip(&mut outcome);
                    continue;
                }
            };

            // `since` is inclusive, so alerts at the checkpoint come back.
            if outcome.checkpoint.is_handled(modified, &alert.alert_url) {
                tracing::debug!(
                    "Alert '{}' ({}) was already processed, skipping",
                    alert.title,
                    alert.modified
                );
                self.skip(&mut outcome);
                continue;
            }

            if let Err(err) = self.checkpoints.write(modified) {
                tracing::error!("Checkpoint write failed, aborting tick: {}", err);
                self.metrics.tick_errors_total.inc();
                outcome.error = Some(err);
                break;
            }
            outcome.checkpoint.advance(modified, &alert.alert_url);
            self.metrics.record_checkpoint(outcome.checkpoint.at());

            if self.settings.debug_mode {
                self.log_suppressed(&alert);
                outcome.suppressed += 1;
                continue;
            }

            self.publish(&alert, &mut outcome).await;

            tracing::info!(
                "Waiting {}s before posting the next alert",
                self.settings.post_spacing.as_secs()
            );
            if !self.pause(shutdown).await {
                tracing::info!("Shutdown requested while pausing between posts");
                outcome.interrupted = true;
                break;
            }
        }

        outcome
    }

    fn skip(&self, outcome: &mut TickOutcome) {
        outcome.skipped += 1;
        self.metrics.alerts_skipped_total.inc();
    }

    fn log_suppressed(&self, alert: &Alert) {
        tracing::info!("Debug mode enabled, not posting to {}", self.publisher.name());
        tracing::info!("Food alert item: {:?}", alert);
        tracing::info!("{}", alert.post_text());
    }

    /// A rejected post is not retried: its checkpoint is already persisted.
    async fn publish(&self, alert: &Alert, outcome: &mut TickOutcome) {
        let text = alert.post_text();
        tracing::info!("Posting to {}: {}", self.publisher.name(), text);

        match self.publisher.publish(&text).await {
            Ok(()) => {
                outcome.published += 1;
                self.metrics.alerts_published_total.inc();
            }
            Err(err) => {
                tracing::error!(
                    "Posting '{}' failed, alert will not be retried: {}",
                    alert.title,
                    err
                );
                outcome.publish_failures += 1;
                self.metrics.publish_failures_total.inc();
            }
        }
    }

    /// Sleep for the post spacing. Returns `false` if shutdown cut it short.
    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = time::sleep(self.settings.post_spacing) => true,
            _ = wait_for_shutdown(shutdown) => false,
        }
    }
}

/// Resolves once the shutdown flag is `true`. Pends forever if the sender
/// is gone without ever signalling.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
