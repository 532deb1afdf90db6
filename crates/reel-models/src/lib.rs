//! Shared data models for the reelcast upload watcher.
//!
//! This crate provides Serde-serializable types for:
//! - Target platforms and their on-disk naming
//! - Upload manifests written by the media pipeline
//! - Uploader results and reports
//! - Watcher run identifiers and outcomes

pub mod manifest;
pub mod outcome;
pub mod platform;
pub mod run;
pub mod upload;

// Re-export common types
pub use manifest::{Manifest, UploadItem};
pub use outcome::{exit_codes, WatchOutcome, WatchState};
pub use platform::{Platform, PlatformParseError};
pub use run::RunId;
pub use upload::{UploadReport, UploadResult};
