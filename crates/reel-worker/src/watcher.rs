//! Upload watcher: one lock-guarded pass over a platform's manifest slot.
//!
//! `IDLE → MANIFEST_FOUND → LOCK_ACQUIRED → UPLOADING → NOTIFYING → RETIRED`,
//! leaving early when no manifest is pending or another run holds the lock.
//! A claimed manifest is always retired, whatever the upload outcome: failed
//! batches are reported, never retried.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use reel_models::{exit_codes, Platform, RunId, UploadReport, UploadResult, WatchOutcome, WatchState};
use reel_notify::{stale_lock_message, Notifier, UploadSummary};
use reel_queue::{ClaimedManifest, LockAcquire, LockGuard, ManifestStore, UploadLock};

use crate::config::WatcherConfig;
use crate::error::WorkerResult;
use crate::logging::WatchLogger;
use crate::metrics;
use crate::uploader::Uploader;

/// Coordinates manifest store, lock, uploader and notifier.
#[derive(Clone)]
pub struct UploadWatcher {
    store: ManifestStore,
    lock: UploadLock,
    uploader: Arc<dyn Uploader>,
    notifier: Arc<dyn Notifier>,
    upload_timeout: Duration,
}

impl UploadWatcher {
    pub fn new(
        store: ManifestStore,
        lock: UploadLock,
        uploader: Arc<dyn Uploader>,
        notifier: Arc<dyn Notifier>,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            store,
            lock,
            uploader,
            notifier,
            upload_timeout,
        }
    }

    /// Build a watcher from configuration and injected collaborators.
    pub fn from_config(
        config: &WatcherConfig,
        uploader: Arc<dyn Uploader>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            ManifestStore::from_config(&config.queue),
            UploadLock::from_config(&config.queue),
            uploader,
            notifier,
            config.upload_timeout,
        )
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Run one invocation for `platform`.
    ///
    /// Returns `Idle` without touching the filesystem when nothing is queued,
    /// `Busy` when another run holds the lock, otherwise the upload report.
    /// The lock is released before returning on every path.
    pub async fn run_once(&self, platform: Platform) -> WorkerResult<WatchOutcome> {
        let run_id = RunId::new();
        let log = WatchLogger::new(platform, &run_id);
        let span = log.create_span();

        let outcome = self.run_with(platform, &run_id, &log).instrument(span).await;
        if let Ok(outcome) = &outcome {
            metrics::record_run(platform, outcome);
        }
        outcome
    }

    async fn run_with(
        &self,
        platform: Platform,
        run_id: &RunId,
        log: &WatchLogger,
    ) -> WorkerResult<WatchOutcome> {
        if !self.store.peek(platform).await? {
            log.log_debug("No manifest pending");
            return Ok(WatchOutcome::Idle);
        }
        log.log_state(WatchState::ManifestFound, "Manifest pending");

        let guard = match self.lock.try_acquire(platform, run_id).await? {
            LockAcquire::Acquired(guard) => guard,
            LockAcquire::Held(holder) => {
                let holder = holder
                    .map(|h| format!("run {} (pid {}) since {}", h.run_id, h.pid, h.acquired_at))
                    .unwrap_or_else(|| "unknown holder".to_string());
                log.log_state(WatchState::Idle, &format!("Upload already in progress by {}, skipping", holder));
                return Ok(WatchOutcome::Busy);
            }
        };
        log.log_state(WatchState::LockAcquired, "Lock acquired");

        let processed = self.process_locked(&guard, log).await;

        if let Err(e) = guard.release().await {
            log.log_error(&format!("Failed to release lock: {}", e));
        }

        Ok(match processed? {
            Some(report) => WatchOutcome::Completed(report),
            None => WatchOutcome::Idle,
        })
    }

    /// Everything that happens while holding the lock. `None` if the manifest
    /// disappeared between peek and claim.
    async fn process_locked(
        &self,
        guard: &LockGuard,
        log: &WatchLogger,
    ) -> WorkerResult<Option<UploadReport>> {
        let platform = guard.platform();

        if let Some(stale) = guard.reclaimed() {
            let discarded = self.store.discard_abandoned(guard).await?;
            metrics::record_stale_reclaim(platform);
            log.log_warning(&format!(
                "Reclaimed stale lock ({}s old){}",
                stale.age.as_secs(),
                if discarded { ", discarded interrupted batch" } else { "" }
            ));
            self.notifier
                .notify(&stale_lock_message(platform, stale.age, discarded))
                .await;
        }

        let Some(claimed) = self.store.claim(guard).await? else {
            log.log_state(WatchState::Idle, "Manifest vanished before claim");
            return Ok(None);
        };

        let report = self.upload_claimed(platform, &claimed, log).await;

        log.log_state(
            WatchState::Notifying,
            &format!(
                "Upload finished with exit code {} ({})",
                report.exit_code,
                if report.is_success() { "success" } else { "failure" }
            ),
        );
        let summary = UploadSummary::from_report(platform, &report);
        self.notifier.notify(&summary.message()).await;

        if let Err(e) = claimed.retire().await {
            log.log_error(&format!("Failed to retire manifest: {}", e));
        } else {
            log.log_state(WatchState::Retired, "Manifest retired");
        }

        Ok(Some(report))
    }

    async fn upload_claimed(
        &self,
        platform: Platform,
        claimed: &ClaimedManifest,
        log: &WatchLogger,
    ) -> UploadReport {
        let manifest = match claimed.read().await {
            Ok(manifest) => manifest,
            Err(e) => {
                log.log_error(&format!("Unreadable manifest: {}", e));
                return UploadReport::failed(exit_codes::DATA_ERR, e.to_string());
            }
        };

        if manifest.is_empty() {
            log.log_debug("Empty manifest, nothing to upload");
            return UploadReport::new(exit_codes::SUCCESS, Some(UploadResult::counts(0, 0)));
        }

        log.log_state(
            WatchState::Uploading,
            &format!("Uploading {} items", manifest.item_count()),
        );

        match tokio::time::timeout(self.upload_timeout, self.uploader.upload(platform, claimed.path())).await {
            Ok(report) => report,
            Err(_) => {
                log.log_error(&format!(
                    "Uploader exceeded {}s timeout and was stopped",
                    self.upload_timeout.as_secs()
                ));
                let mut report = UploadReport::failed(
                    exit_codes::TIMEOUT,
                    format!("uploader timed out after {}s", self.upload_timeout.as_secs()),
                );
                report.timed_out = true;
                report
            }
        }
    }
}
