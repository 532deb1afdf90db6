//! Single-slot manifest queue, one slot per platform.
//!
//! Producers enqueue by writing a temp file and publishing it with a
//! no-clobber hard link, so a manifest is either absent or complete. The
//! consumer holding the platform lock claims the manifest by renaming it out
//! of the slot, and retires it once the upload attempt concludes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use reel_models::{Manifest, Platform};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::lock::{remove_if_exists, LockGuard};

/// Manifest queue rooted at one directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.queue_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the pending manifest slot.
    pub fn pending_path(&self, platform: Platform) -> PathBuf {
        self.dir.join(platform.manifest_file_name())
    }

    /// Path a claimed manifest lives at until retirement.
    pub fn claimed_path(&self, platform: Platform) -> PathBuf {
        self.dir.join(platform.claimed_manifest_file_name())
    }

    /// Whether a manifest is waiting. Never mutates the queue.
    pub async fn peek(&self, platform: Platform) -> QueueResult<bool> {
        Ok(fs::try_exists(self.pending_path(platform)).await?)
    }

    /// Publish a manifest into the platform's slot.
    ///
    /// Fails with [`QueueError::SlotOccupied`] if a manifest is already
    /// pending; the existing one is never overwritten.
    pub async fn enqueue(&self, platform: Platform, manifest: &Manifest) -> QueueResult<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let target = self.pending_path(platform);
        let tmp = self.dir.join(format!(
            ".{}.tmp-{}",
            platform.manifest_file_name(),
            Uuid::new_v4()
        ));

        let body = serde_json::to_vec_pretty(manifest)?;
        if let Err(e) = write_synced(&tmp, &body).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        // hard_link refuses to replace an existing file, unlike rename.
        let published = fs::hard_link(&tmp, &target).await;
        remove_if_exists(&tmp).await?;

        match published {
            Ok(()) => {
                info!(
                    platform = %platform,
                    items = manifest.item_count(),
                    "Enqueued manifest {}",
                    target.display()
                );
                Ok(target)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(platform = %platform, "Manifest slot occupied, not enqueuing");
                Err(QueueError::slot_occupied(&target))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Take the pending manifest out of the slot.
    ///
    /// Requires the platform lock. Returns `None` if the slot emptied since
    /// it was peeked.
    pub async fn claim(&self, guard: &LockGuard) -> QueueResult<Option<ClaimedManifest>> {
        let platform = guard.platform();
        let pending = self.pending_path(platform);
        let claimed = self.claimed_path(platform);

        if fs::try_exists(&claimed).await? {
            warn!(
                platform = %platform,
                run_id = %guard.run_id(),
                "Overwriting leftover claimed manifest {}",
                claimed.display()
            );
        }

        match fs::rename(&pending, &claimed).await {
            Ok(()) => {
                debug!(platform = %platform, run_id = %guard.run_id(), "Claimed manifest");
                Ok(Some(ClaimedManifest {
                    platform,
                    path: claimed,
                }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a manifest claimed by a run that died before retiring it.
    ///
    /// Called after reclaiming a stale lock. The batch is not retried.
    pub async fn discard_abandoned(&self, guard: &LockGuard) -> QueueResult<bool> {
        let platform = guard.platform();
        let claimed = self.claimed_path(platform);
        let existed = remove_if_exists(&claimed).await?;
        if existed {
            warn!(
                platform = %platform,
                run_id = %guard.run_id(),
                "Discarded manifest abandoned by a crashed run"
            );
        }
        Ok(existed)
    }
}

/// A manifest taken out of its slot by the lock holder.
#[derive(Debug)]
pub struct ClaimedManifest {
    platform: Platform,
    path: PathBuf,
}

impl ClaimedManifest {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Location handed to the uploader.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the manifest.
    pub async fn read(&self) -> QueueResult<Manifest> {
        let bytes = fs::read(&self.path).await?;
        Manifest::from_slice(&bytes).map_err(|e| QueueError::invalid_manifest(&self.path, e))
    }

    /// Delete the claimed manifest. Already-deleted counts as retired.
    pub async fn retire(self) -> QueueResult<()> {
        if !remove_if_exists(&self.path).await? {
            warn!(platform = %self.platform, "Claimed manifest already gone at retirement");
        }
        Ok(())
    }
}

async fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(body).await?;
    file.sync_all().await
}
