//! The notification capability.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::NotifyResult;
use crate::webhook::{NotifyConfig, WebhookNotifier};

/// Best-effort delivery of a status message.
///
/// Implementations must never fail the caller: delivery problems are logged
/// and dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Notifier that only writes the message to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        info!(channel = "log", "Notification: {}", message);
    }
}

/// Pick the notifier for a configuration: the webhook when a URL is set,
/// otherwise the log.
pub fn build_notifier(config: &NotifyConfig) -> NotifyResult<Arc<dyn Notifier>> {
    match config.webhook_url {
        Some(_) => Ok(Arc::new(WebhookNotifier::new(config.clone())?)),
        None => {
            info!("No webhook configured; notifications go to the log only");
            Ok(Arc::new(LogNotifier))
        }
    }
}
