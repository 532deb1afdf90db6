//! Pipeline storage retention.
//!
//! This crate provides:
//! - Reset of ephemeral working directories (clips, audio, visuals, temp output)
//! - Age-based deletion of rendered output files
//! - A cleanup report for logging

pub mod config;
pub mod error;
pub mod retention;

pub use config::RetentionConfig;
pub use error::{StorageError, StorageResult};
pub use retention::{clear_ephemeral_dir, run_cleanup, run_cleanup_at, sweep_expired, CleanupReport};
