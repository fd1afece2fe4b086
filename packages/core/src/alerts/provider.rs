//! Alerts Source Interface
//!
//! Abstracts the food alerts feed so the poll loop can run against the
//! live API or an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::alerts::types::Alert;
use crate::error::AppError;

/// Trait for feeds that list food alerts by modification time.
#[async_trait]
pub trait AlertsSource {
    /// Fetch at most `limit` alerts modified at or after `since`.
    ///
    /// Items come back in feed order (newest first). Fails with
    /// `UpstreamUnavailable` or `MalformedResponse`; never retries.
    async fn list_since(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<Alert>, AppError>;

    /// Get the name of this source for logging/debugging
    fn source_name(&self) -> &str;
}
