//! Core data types for food alerts

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A single food-safety notice as returned by the alerts feed.
///
/// `modified` is kept as the raw feed string; it is only interpreted by
/// [`Alert::modified_at`], so a bad date skips one alert instead of
/// failing the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "alertURL", default)]
    pub alert_url: String,
    #[serde(default)]
    pub modified: String,
}

impl Alert {
    pub fn new(
        title: impl Into<String>,
        alert_url: impl Into<String>,
        modified: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            alert_url: alert_url.into(),
            modified: modified.into(),
        }
    }

    /// Parse the `modified` field into a UTC timestamp.
    pub fn modified_at(&self) -> Result<DateTime<Utc>, AppError> {
        parse_modified(&self.modified)
    }

    /// Post body: the title, a newline, then the alert URL.
    pub fn post_text(&self) -> String {
        format!("{}\n{}", self.title, self.alert_url)
    }
}

/// Parse a feed timestamp.
///
/// Accepts RFC 3339, a zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC)
/// and a bare `YYYY-MM-DD` (UTC midnight).
pub fn parse_modified(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let value = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    if let Some(naive) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(AppError::invalid_timestamp(raw))
}
