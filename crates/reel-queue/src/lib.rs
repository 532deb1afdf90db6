//! Filesystem single-slot upload queue.
//!
//! This crate provides:
//! - Atomic manifest enqueue for the media pipeline (write, then no-clobber link)
//! - Exclusive-create lock markers, one per platform
//! - Stale lock reclamation by age
//! - Claim/retire of a manifest by the lock holder only

pub mod config;
pub mod error;
pub mod lock;
pub mod store;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use lock::{LockAcquire, LockGuard, LockInfo, StaleLock, UploadLock};
pub use store::{ClaimedManifest, ManifestStore};
