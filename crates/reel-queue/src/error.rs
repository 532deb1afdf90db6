//! Queue error types.

use std::path::Path;

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Manifest slot occupied: {0}")]
    SlotOccupied(String),

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("Lock operation failed: {0}")]
    LockFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn slot_occupied(path: &Path) -> Self {
        Self::SlotOccupied(path.display().to_string())
    }

    pub fn invalid_manifest(path: &Path, reason: impl ToString) -> Self {
        Self::InvalidManifest {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::LockFailed(msg.into())
    }

    /// Whether the error concerns the manifest contents rather than the filesystem.
    pub fn is_invalid_manifest(&self) -> bool {
        matches!(self, QueueError::InvalidManifest { .. })
    }
}
