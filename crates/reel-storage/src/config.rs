//! Retention configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{StorageError, StorageResult};

const DEFAULT_BASE_DIR: &str = "/pipeline";
const DEFAULT_RETENTION_HOURS: u64 = 24;

/// Which directories a cleanup pass touches, and how.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Directories emptied unconditionally at the start of a pass
    pub ephemeral_dirs: Vec<PathBuf>,
    /// Directories whose files expire after `retention`
    pub output_dirs: Vec<PathBuf>,
    /// Age after which an output file is deleted
    pub retention: Duration,
    /// Extensions (lowercase, no dot) eligible for expiry; empty means any file
    pub extensions: Vec<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::for_base_dir(DEFAULT_BASE_DIR)
    }
}

impl RetentionConfig {
    /// Standard pipeline layout under `base`.
    pub fn for_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            ephemeral_dirs: vec![
                base.join("clips"),
                base.join("audio"),
                base.join("visuals"),
                base.join("output").join("tmp"),
            ],
            output_dirs: vec![base.join("output"), base.join("output").join("shorts")],
            retention: Duration::from_secs(DEFAULT_RETENTION_HOURS * 3600),
            extensions: vec!["mp4".to_string()],
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let base = std::env::var("CLEANUP_BASE_DIR").unwrap_or_else(|_| DEFAULT_BASE_DIR.to_string());
        let mut config = Self::for_base_dir(base);

        config.retention = Duration::from_secs(
            std::env::var("CLEANUP_RETENTION_HOURS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETENTION_HOURS)
                * 3600,
        );

        if let Ok(raw) = std::env::var("CLEANUP_EXTENSIONS") {
            config.extensions = parse_extensions(&raw);
        }

        config
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.retention.is_zero() {
            return Err(StorageError::config_error("retention window must be positive"));
        }
        for dir in &self.ephemeral_dirs {
            if dir.parent().is_none() {
                return Err(StorageError::config_error(format!(
                    "refusing to clear filesystem root {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Whether a file's extension makes it eligible for expiry.
    pub fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
