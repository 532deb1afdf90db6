//! Per-platform upload lock markers.
//!
//! A lock is a file created with exclusive-create semantics, so two watcher
//! invocations racing for the same platform cannot both succeed. The marker's
//! body records who holds it; its age comes from the file's modification time
//! so an unreadable body never prevents reclamation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use reel_models::{Platform, RunId};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};

/// Contents of a lock marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub run_id: RunId,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current(run_id: &RunId) -> Self {
        Self {
            run_id: run_id.clone(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// A lock that was found abandoned and removed before acquisition.
#[derive(Debug, Clone)]
pub struct StaleLock {
    /// Holder recorded in the abandoned marker, if it was readable
    pub info: Option<LockInfo>,
    /// Age of the marker when it was reclaimed
    pub age: Duration,
}

/// Result of an acquisition attempt.
#[derive(Debug)]
pub enum LockAcquire {
    Acquired(LockGuard),
    /// Another invocation holds a fresh lock
    Held(Option<LockInfo>),
}

/// Factory for per-platform locks in one queue directory.
#[derive(Debug, Clone)]
pub struct UploadLock {
    dir: PathBuf,
    stale_after: Duration,
}

#[derive(Debug)]
enum Reclaim {
    Reclaimed(StaleLock),
    /// The marker disappeared before we could move it
    Vanished,
    /// The marker we moved turned out to be fresh and was put back
    LostRace(Option<LockInfo>),
}

impl UploadLock {
    pub fn new(dir: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            dir: dir.into(),
            stale_after,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.queue_dir.clone(), config.stale_lock_after)
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Path of the lock marker for a platform.
    pub fn path(&self, platform: Platform) -> PathBuf {
        self.dir.join(platform.lock_file_name())
    }

    /// Whether a lock marker currently exists (no staleness check).
    pub async fn is_held(&self, platform: Platform) -> QueueResult<bool> {
        Ok(fs::try_exists(self.path(platform)).await?)
    }

    /// Try to take the lock for `platform`.
    ///
    /// A marker older than the stale bound is reclaimed (with a warning) and
    /// acquisition proceeds; the returned guard then reports what it replaced
    /// via [`LockGuard::reclaimed`].
    pub async fn try_acquire(&self, platform: Platform, run_id: &RunId) -> QueueResult<LockAcquire> {
        let path = self.path(platform);
        let mut reclaimed = None;

        // Two rounds: the second follows a reclaim or a marker vanishing under us.
        for _ in 0..2 {
            let info = LockInfo::current(run_id);
            match create_exclusive(&path, &info).await {
                Ok(()) => {
                    debug!(platform = %platform, run_id = %run_id, "Acquired upload lock");
                    return Ok(LockAcquire::Acquired(LockGuard {
                        path,
                        platform,
                        info,
                        reclaimed,
                        released: false,
                    }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            let age = match marker_age(&path).await? {
                Some(age) => age,
                None => continue,
            };

            if age <= self.stale_after {
                return Ok(LockAcquire::Held(read_info(&path).await));
            }

            match self.reclaim(&path, platform).await? {
                Reclaim::Reclaimed(stale) => reclaimed = Some(stale),
                Reclaim::Vanished => {}
                Reclaim::LostRace(info) => return Ok(LockAcquire::Held(info)),
            }
        }

        Ok(LockAcquire::Held(read_info(&path).await))
    }

    /// Move a stale marker out of the way.
    ///
    /// Renaming to a unique tombstone means only one reclaimer can take a given
    /// marker. If the tombstone is fresh, a concurrent invocation had already
    /// replaced the stale marker and we moved its live lock: restore it without
    /// clobbering anything created since.
    async fn reclaim(&self, path: &Path, platform: Platform) -> QueueResult<Reclaim> {
        let tombstone = self.dir.join(format!(
            "{}.stale-{}",
            platform.lock_file_name(),
            Uuid::new_v4()
        ));

        match fs::rename(path, &tombstone).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Reclaim::Vanished),
            Err(e) => return Err(e.into()),
        }

        let info = read_info(&tombstone).await;
        let age = marker_age(&tombstone).await?.unwrap_or_default();

        if age <= self.stale_after {
            match fs::hard_link(&tombstone, path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => {
                    warn!(
                        platform = %platform,
                        "Failed to restore live lock marker {}: {}",
                        path.display(),
                        e
                    );
                }
            }
            remove_if_exists(&tombstone).await?;
            return Ok(Reclaim::LostRace(info));
        }

        remove_if_exists(&tombstone).await?;

        warn!(
            platform = %platform,
            age_secs = age.as_secs(),
            holder_run_id = info.as_ref().map(|i| i.run_id.to_string()).unwrap_or_default(),
            holder_pid = info.as_ref().map(|i| i.pid).unwrap_or_default(),
            "Reclaimed stale upload lock"
        );

        Ok(Reclaim::Reclaimed(StaleLock { info, age }))
    }
}

/// Proof of holding the lock for one platform.
///
/// Release explicitly with [`LockGuard::release`]; a guard dropped without
/// releasing removes its marker on a best-effort basis.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    platform: Platform,
    info: LockInfo,
    reclaimed: Option<StaleLock>,
    released: bool,
}

impl LockGuard {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn run_id(&self) -> &RunId {
        &self.info.run_id
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The abandoned lock this guard replaced, if any.
    pub fn reclaimed(&self) -> Option<&StaleLock> {
        self.reclaimed.as_ref()
    }

    /// Remove the lock marker.
    ///
    /// A marker that now belongs to a different run (ours was reclaimed as
    /// stale) is left in place.
    pub async fn release(mut self) -> QueueResult<()> {
        self.released = true;

        match read_info(&self.path).await {
            Some(current) if current.run_id != self.info.run_id => {
                warn!(
                    platform = %self.platform,
                    run_id = %self.info.run_id,
                    holder_run_id = %current.run_id,
                    "Lock marker was taken over by another run; leaving it in place"
                );
                return Ok(());
            }
            _ => {}
        }

        if !remove_if_exists(&self.path).await? {
            warn!(
                platform = %self.platform,
                run_id = %self.info.run_id,
                "Lock marker already gone at release"
            );
        }
        debug!(platform = %self.platform, run_id = %self.info.run_id, "Released upload lock");
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Same ownership rule as `release`, done synchronously.
        let current = std::fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockInfo>(&bytes).ok());
        if let Some(current) = current {
            if current.run_id != self.info.run_id {
                warn!(
                    platform = %self.platform,
                    run_id = %self.info.run_id,
                    holder_run_id = %current.run_id,
                    "Dropped guard no longer owns the lock marker; leaving it in place"
                );
                return;
            }
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(
                    platform = %self.platform,
                    "Failed to remove lock marker {} on drop: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Create `path` only if it does not exist, then write the holder info.
async fn create_exclusive(path: &Path, info: &LockInfo) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let body = serde_json::to_vec(info).map_err(std::io::Error::other)?;
    let written = async {
        file.write_all(&body).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(path).await;
        return Err(e);
    }
    Ok(())
}

/// Age of a marker from its mtime; `None` if it no longer exists.
async fn marker_age(path: &Path) -> QueueResult<Option<Duration>> {
    let metadata = match fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let modified = metadata
        .modified()
        .map_err(|e| QueueError::lock_failed(format!("mtime unavailable: {}", e)))?;
    // Future mtimes (clock skew) count as brand new.
    Ok(Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default(),
    ))
}

async fn read_info(path: &Path) -> Option<LockInfo> {
    let bytes = fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Remove a file, treating "already gone" as success. Returns whether it existed.
pub(crate) async fn remove_if_exists(path: &Path) -> QueueResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
