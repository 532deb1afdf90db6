//! Worker error types.

use thiserror::Error;

use reel_models::exit_codes;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Usage: {0}")]
    Usage(String),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error("Notify error: {0}")]
    Notify(#[from] reel_notify::NotifyError),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Exit status a binary should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::ConfigError(_) | WorkerError::Notify(_) => exit_codes::CONFIG,
            WorkerError::Usage(_) => exit_codes::USAGE,
            WorkerError::Queue(e) if e.is_invalid_manifest() => exit_codes::DATA_ERR,
            _ => exit_codes::FAILURE,
        }
    }
}
