//! Persisted poll checkpoint.
//!
//! The checkpoint is the `modified` timestamp of the last alert the bot
//! has taken responsibility for. It lives in a single human-readable file
//! holding one ISO-8601 UTC timestamp, e.g. `2024-01-02T00:00:00Z` or
//! `2024-01-02T00:00:00.123456Z`. The fraction is written at whatever
//! precision the alert carried, so a restart compares against exactly the
//! instant that was processed.
//!
//! Writes go through a temp file in the same directory followed by a
//! rename, so a reader never observes a half-written value.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tempfile::NamedTempFile;

use crate::error::AppError;

/// Store for the single checkpoint timestamp.
pub trait CheckpointStore {
    /// Current checkpoint, or the startup default when none was persisted.
    fn read(&self) -> Result<DateTime<Utc>, AppError>;

    /// Durably replace the checkpoint.
    fn write(&self, at: DateTime<Utc>) -> Result<(), AppError>;
}

/// Render a timestamp the way it is persisted. Sub-second digits appear
/// only when non-zero, and are never truncated.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// The checkpoint as the poll loop threads it from tick to tick.
///
/// Alongside the instant it remembers the URLs of the alerts handled *at*
/// that instant, so a distinct alert that shares the same `modified`
/// value is still processed. A checkpoint restored from the file has no
/// such list and treats everything at its instant as handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    at: DateTime<Utc>,
    handled: Option<BTreeSet<String>>,
}

impl Checkpoint {
    pub fn restored(at: DateTime<Utc>) -> Self {
        Self { at, handled: None }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Whether the alert at `modified` with `alert_url` was already processed.
    pub fn is_handled(&self, modified: DateTime<Utc>, alert_url: &str) -> bool {
        match modified.cmp(&self.at) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self
                .handled
                .as_ref()
                .map_or(true, |urls| urls.contains(alert_url)),
        }
    }

    /// Record that the alert at `modified` has been taken care of.
    /// Never moves the instant backwards.
    pub fn advance(&mut self, modified: DateTime<Utc>, alert_url: &str) {
        match modified.cmp(&self.at) {
            Ordering::Greater => {
                self.at = modified;
                self.handled = Some(BTreeSet::from([alert_url.to_string()]));
            }
            Ordering::Equal => {
                self.handled
                    .get_or_insert_with(BTreeSet::new)
                    .insert(alert_url.to_string());
            }
            Ordering::Less => {}
        }
    }
}

impl From<DateTime<Utc>> for Checkpoint {
    fn from(at: DateTime<Utc>) -> Self {
        Self::restored(at)
    }
}

/// File-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
    debug_mode: bool,
    lookback: Duration,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>, debug_mode: bool, lookback: Duration) -> Self {
        Self {
            path: path.into(),
            debug_mode,
            lookback,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint relative to `now`.
    ///
    /// With no file the default is `now`, or `now - lookback` in
    /// diagnostic mode so a dry run has recent alerts to show. A file
    /// whose contents do not parse is `CorruptCheckpoint`; it is never
    /// replaced by a default, as that could re-post the whole backlog.
    pub fn read_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let default = if self.debug_mode { now - self.lookback } else { now };
                tracing::debug!(
                    "No checkpoint at {}, starting from {}",
                    self.path.display(),
                    format_timestamp(default)
                );
                return Ok(default);
            }
            Err(err) => return Err(AppError::CheckpointIo(err)),
        };

        let value = raw.trim();
        DateTime::parse_from_rfc3339(value)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|_| AppError::corrupt_checkpoint(value))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn read(&self) -> Result<DateTime<Utc>, AppError> {
        self.read_at(Utc::now())
    }

    fn write(&self, at: DateTime<Utc>) -> Result<(), AppError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(format_timestamp(at).as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}
