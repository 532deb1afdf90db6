//! Upload watcher.
//!
//! This crate provides:
//! - Watcher configuration built once at start-up
//! - The platform uploader adapter (external process, bounded by a timeout)
//! - `UploadWatcher::run_once`, one lock-guarded pass over a platform's queue
//! - Structured run logging and metrics
//! - Binaries: `upload-watcher`, `retention-cleanup`, `enqueue-manifest`

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod uploader;
pub mod watcher;

pub use config::{load_env_file, WatcherConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, WatchLogger};
pub use uploader::{ProcessUploader, Uploader, UploaderCommand};
pub use watcher::UploadWatcher;
