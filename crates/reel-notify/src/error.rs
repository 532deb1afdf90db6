//! Notification error types.
//!
//! These never reach the watcher: `Notifier::notify` logs and swallows them.

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("Webhook rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl NotifyError {
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }
}
