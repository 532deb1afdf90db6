//! Watcher configuration.
//!
//! Built once at process start from the environment (populated from a local
//! env file) and passed to every component.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use reel_models::Platform;
use reel_notify::NotifyConfig;
use reel_queue::QueueConfig;

use crate::error::{WorkerError, WorkerResult};
use crate::uploader::UploaderCommand;

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Manifest and lock locations
    pub queue: QueueConfig,
    /// Notification channel
    pub notify: NotifyConfig,
    /// Maximum wall time for one uploader invocation
    pub upload_timeout: Duration,
    /// Tick interval when running with `--loop`
    pub watch_interval: Duration,
    /// Uploader command line per platform
    pub uploaders: HashMap<Platform, UploaderCommand>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            notify: NotifyConfig::default(),
            upload_timeout: Duration::from_secs(1800), // 30 minutes
            watch_interval: Duration::from_secs(300),  // 5 minutes
            uploaders: Platform::ALL
                .iter()
                .map(|p| (*p, UploaderCommand::default_for(*p)))
                .collect(),
        }
    }
}

impl WatcherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let uploaders = Platform::ALL
            .iter()
            .map(|platform| (*platform, uploader_from_env(*platform)))
            .collect();

        Self {
            queue: QueueConfig::from_env(),
            notify: NotifyConfig::from_env(),
            upload_timeout: Duration::from_secs(
                std::env::var("REEL_UPLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            watch_interval: Duration::from_secs(
                std::env::var("REEL_WATCH_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            uploaders,
        }
    }

    /// Reject configurations the watcher cannot run safely with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.upload_timeout.is_zero() {
            return Err(WorkerError::config_error("upload timeout must be positive"));
        }
        if self.watch_interval.is_zero() {
            return Err(WorkerError::config_error("watch interval must be positive"));
        }
        // A lock younger than the longest possible upload may still be live.
        if self.queue.stale_lock_after <= self.upload_timeout {
            return Err(WorkerError::config_error(format!(
                "stale lock bound ({}s) must exceed the upload timeout ({}s)",
                self.queue.stale_lock_after.as_secs(),
                self.upload_timeout.as_secs()
            )));
        }
        for (platform, command) in &self.uploaders {
            if command.program.trim().is_empty() {
                return Err(WorkerError::config_error(format!(
                    "empty uploader command for {}",
                    platform
                )));
            }
        }
        self.notify.validate()?;
        Ok(())
    }
}

fn uploader_from_env(platform: Platform) -> UploaderCommand {
    let key = platform.env_key();
    let mut command = std::env::var(format!("REEL_UPLOADER_{}_CMD", key))
        .ok()
        .and_then(|raw| UploaderCommand::parse(&raw))
        .unwrap_or_else(|| UploaderCommand::default_for(platform));

    if let Ok(raw) = std::env::var(format!("REEL_UPLOADER_{}_MAX", key)) {
        match raw.trim().parse::<u32>() {
            Ok(max) if max > 0 => command.max_uploads = Some(max),
            _ => warn!(platform = %platform, "Ignoring invalid upload limit {:?}", raw),
        }
    }
    command
}

/// Load the local env file into the process environment.
///
/// `REEL_ENV_FILE` names the file; otherwise `.env` is searched for from the
/// current directory upwards. A missing file is not an error.
pub fn load_env_file() -> Option<PathBuf> {
    match std::env::var("REEL_ENV_FILE") {
        Ok(path) => {
            let path = PathBuf::from(path);
            match dotenvy::from_path(&path) {
                Ok(()) => Some(path),
                Err(e) => {
                    // Logging is not initialised yet; report on stderr.
                    eprintln!("warning: failed to load env file {}: {}", path.display(), e);
                    None
                }
            }
        }
        Err(_) => dotenvy::dotenv().ok(),
    }
}
