//! Upload outcome notifications.
//!
//! This crate provides:
//! - The `Notifier` capability injected into the watcher
//! - A webhook notifier posting `{"content": ...}` (Discord-compatible)
//! - A log-only notifier for setups without a webhook
//! - Message formatting for upload summaries

pub mod error;
pub mod message;
pub mod notifier;
pub mod webhook;

pub use error::{NotifyError, NotifyResult};
pub use message::{stale_lock_message, UploadSummary, MAX_MESSAGE_CHARS};
pub use notifier::{build_notifier, LogNotifier, Notifier};
pub use webhook::{NotifyConfig, WebhookNotifier};
