//! Queue configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Directory holding manifests and lock markers
    pub queue_dir: PathBuf,
    /// Age after which a lock marker is treated as abandoned
    pub stale_lock_after: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_dir: PathBuf::from("/pipeline/queue"),
            stale_lock_after: Duration::from_secs(3600), // 12 scheduler ticks
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            queue_dir: std::env::var("REEL_QUEUE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/pipeline/queue")),
            stale_lock_after: Duration::from_secs(
                std::env::var("REEL_STALE_LOCK_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        }
    }

    pub fn with_queue_dir(mut self, queue_dir: impl Into<PathBuf>) -> Self {
        self.queue_dir = queue_dir.into();
        self
    }

    pub fn with_stale_lock_after(mut self, stale_lock_after: Duration) -> Self {
        self.stale_lock_after = stale_lock_after;
        self
    }
}
