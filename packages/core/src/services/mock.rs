//! In-memory fakes for scheduler tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::alerts::{Alert, AlertsSource};
use crate::checkpoint::CheckpointStore;
use crate::error::AppError;
use crate::publish::Publisher;

/// Alerts source that replays canned responses, one per call. Once the
/// queue is drained every call returns an empty list.
#[derive(Default)]
pub struct MockAlertsSource {
    responses: Mutex<VecDeque<Result<Vec<Alert>, AppError>>>,
    calls: Mutex<Vec<(DateTime<Utc>, u32)>>,
}

impl MockAlertsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alerts(self, alerts: Vec<Alert>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(alerts));
        self
    }

    pub fn with_error(self, err: AppError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    /// `(since, limit)` of every call so far.
    pub fn calls(&self) -> Vec<(DateTime<Utc>, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertsSource for MockAlertsSource {
    async fn list_since(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<Alert>, AppError> {
        self.calls.lock().unwrap().push((since, limit));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn source_name(&self) -> &str {
        "mock"
    }
}

/// Publisher that records each post with the (tokio) instant it was made.
#[derive(Default)]
pub struct RecordingPublisher {
    posts: Mutex<Vec<(String, Instant)>>,
    failures: Mutex<VecDeque<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a rejection for the next publish call.
    pub fn failing_next(self, reason: &str) -> Self {
        self.failures.lock().unwrap().push_back(reason.to_string());
        self
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn instants(&self) -> Vec<Instant> {
        self.posts.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn call_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, text: &str) -> Result<(), AppError> {
        self.posts
            .lock()
            .unwrap()
            .push((text.to_string(), Instant::now()));
        match self.failures.lock().unwrap().pop_front() {
            Some(reason) => Err(AppError::PublishRejected(reason)),
            None => Ok(()),
        }
    }
}

/// Checkpoint store held in memory, with an optional failing write.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    value: Mutex<Option<DateTime<Utc>>>,
    history: Mutex<Vec<DateTime<Utc>>>,
    fail_writes: bool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<DateTime<Utc>> {
        *self.value.lock().unwrap()
    }

    /// Every value written, in order.
    pub fn history(&self) -> Vec<DateTime<Utc>> {
        self.history.lock().unwrap().clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn read(&self) -> Result<DateTime<Utc>, AppError> {
        Ok(self.current().unwrap_or_else(Utc::now))
    }

    fn write(&self, at: DateTime<Utc>) -> Result<(), AppError> {
        if self.fail_writes {
            return Err(AppError::CheckpointIo(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        *self.value.lock().unwrap() = Some(at);
        self.history.lock().unwrap().push(at);
        Ok(())
    }
}
