//! Publishing platforms.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A platform the pipeline publishes shorts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
}

impl Platform {
    /// All supported platforms, in the order the watcher reports them.
    pub const ALL: [Platform; 3] = [Platform::YouTube, Platform::TikTok, Platform::Instagram];

    /// Lowercase identifier used in file names and environment variables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
        }
    }

    /// Human-facing name used in notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::TikTok => "TikTok",
            Platform::Instagram => "Instagram",
        }
    }

    /// File name of the pending manifest, e.g. `tiktok_manifest.json`.
    pub fn manifest_file_name(&self) -> String {
        format!("{}_manifest.json", self.as_str())
    }

    /// File name of a manifest claimed by an in-flight run.
    pub fn claimed_manifest_file_name(&self) -> String {
        format!(".{}_manifest.claimed.json", self.as_str())
    }

    /// File name of the lock marker, e.g. `.tiktok_uploading`.
    pub fn lock_file_name(&self) -> String {
        format!(".{}_uploading", self.as_str())
    }

    /// Uppercase key used to build per-platform environment variable names.
    pub fn env_key(&self) -> &'static str {
        match self {
            Platform::YouTube => "YOUTUBE",
            Platform::TikTok => "TIKTOK",
            Platform::Instagram => "INSTAGRAM",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a platform name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown platform: {0} (expected youtube, tiktok or instagram)")]
pub struct PlatformParseError(pub String);

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" | "yt" => Ok(Platform::YouTube),
            "tiktok" | "tt" => Ok(Platform::TikTok),
            "instagram" | "ig" => Ok(Platform::Instagram),
            other => Err(PlatformParseError(other.to_string())),
        }
    }
}
