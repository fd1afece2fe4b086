use thiserror::Error;

/// Unified application error.
///
/// Each variant maps to one failure class of the poll loop. Where it is
/// raised decides the response: at startup any error exits the process,
/// inside a tick it skips an item or aborts that tick.
#[derive(Error, Debug)]
pub enum AppError {
    /// The alerts feed could not be reached or answered with a non-success status.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The alerts feed answered, but the payload is unusable.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// An alert's `modified` field is not a recognisable date.
    #[error("Invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    /// The social network refused (or never acknowledged) a post.
    #[error("Publish rejected: {0}")]
    PublishRejected(String),

    /// The checkpoint file could not be read or written.
    #[error("Checkpoint I/O error: {0}")]
    CheckpointIo(#[from] std::io::Error),

    /// The checkpoint file exists but does not hold a timestamp.
    #[error("Corrupt checkpoint '{value}'")]
    CorruptCheckpoint { value: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AppError {
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp { value: value.into() }
    }

    pub fn corrupt_checkpoint(value: impl Into<String>) -> Self {
        Self::CorruptCheckpoint { value: value.into() }
    }
}
