//! Webhook delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{NotifyError, NotifyResult};
use crate::notifier::Notifier;

/// Configuration for webhook notifications.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Webhook endpoint; `None` disables webhook delivery
    pub webhook_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl NotifyConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let webhook_url = std::env::var("NOTIFY_WEBHOOK_URL")
            .or_else(|_| std::env::var("DISCORD_WEBHOOK_URL"))
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            webhook_url,
            timeout: Duration::from_secs(
                std::env::var("NOTIFY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the webhook URL, if any, is an absolute http(s) URL.
    pub fn validate(&self) -> NotifyResult<()> {
        if let Some(raw) = &self.webhook_url {
            parse_webhook_url(raw)?;
        }
        Ok(())
    }
}

fn parse_webhook_url(raw: &str) -> NotifyResult<Url> {
    let url = Url::parse(raw).map_err(|e| NotifyError::invalid_url(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NotifyError::invalid_url(format!(
            "unsupported scheme {} (expected http or https)",
            other
        ))),
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts `{"content": message}` to a webhook, once, without retry.
pub struct WebhookNotifier {
    http: Client,
    url: Url,
}

impl WebhookNotifier {
    /// Create a webhook notifier. Fails if no valid URL is configured.
    pub fn new(config: NotifyConfig) -> NotifyResult<Self> {
        let raw = config
            .webhook_url
            .as_deref()
            .ok_or_else(|| NotifyError::invalid_url("webhook URL not set"))?;
        let url = parse_webhook_url(raw)?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(NotifyError::Network)?;

        Ok(Self { http, url })
    }

    /// Deliver one message, reporting any failure.
    pub async fn send(&self, message: &str) -> NotifyResult<()> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&WebhookPayload { content: message })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        debug!("Webhook notification delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) {
        if let Err(e) = self.send(message).await {
            warn!(host = self.url.host_str().unwrap_or_default(), "Notification delivery failed: {}", e);
        }
    }
}
