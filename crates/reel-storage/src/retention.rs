//! Cleanup pass: reset working directories, expire old outputs.
//!
//! A pass never coordinates with the upload watcher. Its targets are disjoint
//! from the queue directory, and only files already past the retention window
//! are deleted.

use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use metrics::counter;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::RetentionConfig;
use crate::error::{StorageError, StorageResult};

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Ephemeral directories reset to empty
    pub dirs_cleared: usize,
    /// Expired output files deleted
    pub files_deleted: usize,
    /// Bytes reclaimed by deleted output files
    pub bytes_freed: u64,
    /// Output files still inside the retention window
    pub files_kept: usize,
    /// Entries that could not be removed or inspected
    pub errors: usize,
}

impl CleanupReport {
    fn merge(&mut self, other: CleanupReport) {
        self.dirs_cleared += other.dirs_cleared;
        self.files_deleted += other.files_deleted;
        self.bytes_freed += other.bytes_freed;
        self.files_kept += other.files_kept;
        self.errors += other.errors;
    }
}

/// Run a full cleanup pass against the current clock.
pub async fn run_cleanup(config: &RetentionConfig) -> StorageResult<CleanupReport> {
    run_cleanup_at(config, SystemTime::now()).await
}

/// Run a full cleanup pass, judging file age against `now`.
pub async fn run_cleanup_at(config: &RetentionConfig, now: SystemTime) -> StorageResult<CleanupReport> {
    config.validate()?;

    let mut report = CleanupReport::default();

    for dir in &config.ephemeral_dirs {
        match clear_ephemeral_dir(dir).await {
            Ok(failures) => {
                report.dirs_cleared += 1;
                report.errors += failures;
            }
            Err(e) => {
                warn!("Failed to clear {}: {}", dir.display(), e);
                report.errors += 1;
            }
        }
    }

    for dir in &config.output_dirs {
        report.merge(sweep_expired(dir, config, now).await);
    }

    counter!("reel_cleanup_files_deleted_total").increment(report.files_deleted as u64);

    info!(
        dirs_cleared = report.dirs_cleared,
        files_deleted = report.files_deleted,
        bytes_freed = report.bytes_freed,
        files_kept = report.files_kept,
        errors = report.errors,
        "Cleanup pass complete"
    );

    Ok(report)
}

/// Empty `dir`, creating it if missing. Returns the number of entries that
/// could not be removed.
pub async fn clear_ephemeral_dir(dir: &Path) -> StorageResult<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir).await?;
            debug!("Created missing working directory {}", dir.display());
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let mut failures = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let removed = match entry.file_type().await {
            // Symlinks are unlinked, never followed.
            Ok(ft) if ft.is_dir() => fs::remove_dir_all(&path).await,
            Ok(_) => fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    debug!("Cleared working directory {}", dir.display());
    Ok(failures)
}

/// Delete regular files directly inside `dir` that are strictly older than
/// the retention window. Subdirectories are left alone.
pub async fn sweep_expired(dir: &Path, config: &RetentionConfig, now: SystemTime) -> CleanupReport {
    let mut report = CleanupReport::default();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Output directory {} does not exist, skipping", dir.display());
            return report;
        }
        Err(e) => {
            warn!("Failed to list {}: {}", dir.display(), e);
            report.errors += 1;
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", dir.display(), e);
                report.errors += 1;
                break;
            }
        };

        let path = entry.path();
        match expire_entry(&entry, config, now).await {
            Ok(Some(bytes)) => {
                debug!("Deleted expired output {}", path.display());
                report.files_deleted += 1;
                report.bytes_freed += bytes;
            }
            Ok(None) => {
                if entry.file_type().await.map(|ft| ft.is_file()).unwrap_or(false)
                    && config.matches_extension(&path)
                {
                    report.files_kept += 1;
                }
            }
            Err(e) => {
                warn!("Failed to expire {}: {}", path.display(), e);
                report.errors += 1;
            }
        }
    }

    report
}

/// Delete one entry if it is an expired output file; returns its size.
async fn expire_entry(
    entry: &fs::DirEntry,
    config: &RetentionConfig,
    now: SystemTime,
) -> StorageResult<Option<u64>> {
    let path = entry.path();
    if !entry.file_type().await?.is_file() || !config.matches_extension(&path) {
        return Ok(None);
    }

    let metadata = entry.metadata().await?;
    let modified = metadata.modified()?;
    let age = match now.duration_since(modified) {
        Ok(age) => age,
        // Modified in the future relative to `now`: not expired.
        Err(_) => return Ok(None),
    };

    if age <= config.retention {
        return Ok(None);
    }

    match fs::remove_file(&path).await {
        Ok(()) => Ok(Some(metadata.len())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::delete_failed(format!("{}: {}", path.display(), e))),
    }
}
