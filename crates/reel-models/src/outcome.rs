//! Watcher states and outcomes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::UploadReport;

/// Process exit codes used by the watcher binaries.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Generic failure (filesystem error, uploader reported failure without a code)
    pub const FAILURE: i32 = 1;
    /// Bad command line
    pub const USAGE: i32 = 2;
    /// Manifest could not be read or parsed (`EX_DATAERR`)
    pub const DATA_ERR: i32 = 65;
    /// Invalid configuration (`EX_CONFIG`)
    pub const CONFIG: i32 = 78;
    /// Uploader killed after exceeding its timeout
    pub const TIMEOUT: i32 = 124;
    /// Uploader could not be started
    pub const SPAWN_FAILED: i32 = 127;
}

/// Step of a single watcher invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Idle,
    ManifestFound,
    LockAcquired,
    Uploading,
    Notifying,
    Retired,
}

impl WatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchState::Idle => "idle",
            WatchState::ManifestFound => "manifest_found",
            WatchState::LockAcquired => "lock_acquired",
            WatchState::Uploading => "uploading",
            WatchState::Notifying => "notifying",
            WatchState::Retired => "retired",
        }
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a watcher invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WatchOutcome {
    /// No manifest pending
    Idle,
    /// Another invocation holds the lock
    Busy,
    /// An upload attempt ran and its manifest was retired
    Completed(UploadReport),
}

impl WatchOutcome {
    /// Exit status propagated to the scheduler.
    pub fn exit_code(&self) -> i32 {
        match self {
            WatchOutcome::Idle | WatchOutcome::Busy => exit_codes::SUCCESS,
            WatchOutcome::Completed(report) => report.exit_code,
        }
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            WatchOutcome::Idle => "idle",
            WatchOutcome::Busy => "busy",
            WatchOutcome::Completed(report) if report.is_success() => "uploaded",
            WatchOutcome::Completed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(WatchOutcome::Idle.exit_code(), 0);
        assert_eq!(WatchOutcome::Busy.exit_code(), 0);
        let report = UploadReport::failed(exit_codes::TIMEOUT, "timed out");
        assert_eq!(WatchOutcome::Completed(report).exit_code(), 124);
    }

    #[test]
    fn test_labels() {
        let ok = WatchOutcome::Completed(UploadReport::new(0, None));
        assert_eq!(ok.label(), "uploaded");
        let failed = WatchOutcome::Completed(UploadReport::new(3, None));
        assert_eq!(failed.label(), "failed");
    }
}
