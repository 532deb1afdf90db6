//! End-to-end watcher runs against a temporary queue directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tempfile::TempDir;

use reel_models::{exit_codes, Manifest, Platform, UploadItem, UploadReport, UploadResult, WatchOutcome};
use reel_notify::Notifier;
use reel_queue::{ManifestStore, UploadLock};
use reel_worker::{Uploader, UploadWatcher};

const STALE_AFTER: Duration = Duration::from_secs(3600);

/// Uploader that records calls and returns a fixed report after an optional delay.
struct FakeUploader {
    report: UploadReport,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<(Platform, PathBuf)>>,
}

impl FakeUploader {
    fn returning(report: UploadReport) -> Arc<Self> {
        Self::slow(report, Duration::ZERO)
    }

    fn slow(report: UploadReport, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            report,
            delay,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, platform: Platform, manifest_path: &Path) -> UploadReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((platform, manifest_path.to_path_buf()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.report.clone()
    }
}

#[derive(Default)]
struct FakeNotifier {
    messages: Mutex<Vec<String>>,
}

impl FakeNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

struct Harness {
    dir: TempDir,
    store: ManifestStore,
    lock: UploadLock,
    notifier: Arc<FakeNotifier>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            store: ManifestStore::new(dir.path()),
            lock: UploadLock::new(dir.path(), STALE_AFTER),
            notifier: Arc::new(FakeNotifier::default()),
            dir,
        }
    }

    fn watcher(&self, uploader: Arc<FakeUploader>, timeout: Duration) -> UploadWatcher {
        UploadWatcher::new(
            self.store.clone(),
            self.lock.clone(),
            uploader,
            self.notifier.clone(),
            timeout,
        )
    }

    async fn enqueue(&self, platform: Platform, items: usize) {
        let items = (0..items)
            .map(|i| UploadItem::new(format!("/pipeline/output/shorts/{}.mp4", i), format!("Short {}", i)))
            .collect();
        self.store.enqueue(platform, &Manifest::new(items)).await.unwrap();
    }

    fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn counts(uploaded: u64, total: u64) -> UploadReport {
    UploadReport::new(0, Some(UploadResult::counts(uploaded, total)))
}

fn write_aged(path: &Path, contents: &[u8], age: Duration) {
    std::fs::write(path, contents).unwrap();
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[tokio::test]
async fn no_manifest_is_a_silent_no_op() {
    let h = Harness::new();
    let uploader = FakeUploader::returning(counts(1, 1));

    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::TikTok)
        .await
        .unwrap();

    assert_eq!(outcome, WatchOutcome::Idle);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(uploader.calls(), 0);
    assert!(h.notifier.messages().is_empty());
    assert!(h.entries().is_empty());
}

#[tokio::test]
async fn held_lock_leaves_manifest_untouched() {
    let h = Harness::new();
    h.enqueue(Platform::YouTube, 2).await;
    let lock_path = h.lock.path(Platform::YouTube);
    std::fs::write(&lock_path, b"{}").unwrap();
    let before = std::fs::read(h.store.pending_path(Platform::YouTube)).unwrap();

    let uploader = FakeUploader::returning(counts(2, 2));
    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::YouTube)
        .await
        .unwrap();

    assert_eq!(outcome, WatchOutcome::Busy);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(uploader.calls(), 0);
    assert!(lock_path.exists());
    assert_eq!(std::fs::read(h.store.pending_path(Platform::YouTube)).unwrap(), before);
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn success_retires_manifest_and_lock() {
    let h = Harness::new();
    h.enqueue(Platform::TikTok, 3).await;
    let uploader = FakeUploader::returning(counts(3, 3));

    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::TikTok)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(uploader.calls(), 1);
    assert_eq!(
        h.notifier.messages(),
        vec!["✅ TikTok upload complete: 3/3 shorts uploaded".to_string()]
    );
    assert!(h.entries().is_empty(), "{:?}", h.entries());
}

#[tokio::test]
async fn failure_is_reported_and_still_retired() {
    let h = Harness::new();
    h.enqueue(Platform::Instagram, 2).await;
    let report = UploadReport::new(3, None).with_diagnostics("RuntimeError: token expired");
    let uploader = FakeUploader::returning(report);

    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::Instagram)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(outcome.label(), "failed");
    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("❌ Instagram upload failed: ?/? shorts uploaded"));
    assert!(messages[0].contains("token expired"));
    assert!(h.entries().is_empty(), "{:?}", h.entries());
}

#[tokio::test]
async fn partial_upload_message_names_both_figures() {
    let h = Harness::new();
    h.enqueue(Platform::YouTube, 3).await;
    let uploader = FakeUploader::returning(counts(2, 3));

    let outcome = h
        .watcher(uploader, Duration::from_secs(30))
        .run_once(Platform::YouTube)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    let messages = h.notifier.messages();
    assert!(messages[0].contains("YouTube"));
    assert!(messages[0].contains("2/3"));
}

#[tokio::test]
async fn malformed_uploader_output_reports_unknown_counts() {
    let h = Harness::new();
    h.enqueue(Platform::TikTok, 1).await;
    let uploader = FakeUploader::returning(UploadReport::new(0, UploadResult::parse_output("done!")));

    let outcome = h
        .watcher(uploader, Duration::from_secs(30))
        .run_once(Platform::TikTok)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert!(h.notifier.messages()[0].contains("?/?"));
}

#[tokio::test]
async fn empty_manifest_reports_zero_of_zero() {
    let h = Harness::new();
    h.enqueue(Platform::Instagram, 0).await;
    let uploader = FakeUploader::returning(counts(9, 9));

    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::Instagram)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(uploader.calls(), 0);
    assert!(h.notifier.messages()[0].contains("0/0"));
    assert!(h.entries().is_empty());
}

#[tokio::test]
async fn invalid_manifest_exits_with_data_error() {
    let h = Harness::new();
    std::fs::write(h.store.pending_path(Platform::YouTube), b"not json").unwrap();
    let uploader = FakeUploader::returning(counts(1, 1));

    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::YouTube)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), exit_codes::DATA_ERR);
    assert_eq!(uploader.calls(), 0);
    assert!(h.entries().is_empty());
}

#[tokio::test]
async fn loosely_shaped_manifests_still_reach_the_uploader() {
    let cases: [&[u8]; 5] = [
        br#"{"shorts": [{"file": "/o/a.mp4", "title": "A"}]}"#,
        br#"{"shorts": [{"path": "/o/a.mp4", "title": null}]}"#,
        br#"{"shorts": [{"path": "/o/a.mp4", "tags": null}]}"#,
        br#"{"success": null, "shorts": [{"path": "/o/a.mp4"}]}"#,
        br#"{"items": ["/o/a.mp4"], "shorts_count": "1"}"#,
    ];

    for raw in cases {
        let h = Harness::new();
        std::fs::write(h.store.pending_path(Platform::TikTok), raw).unwrap();
        let uploader = FakeUploader::returning(counts(1, 1));

        let outcome = h
            .watcher(uploader.clone(), Duration::from_secs(30))
            .run_once(Platform::TikTok)
            .await
            .unwrap();

        let raw = String::from_utf8_lossy(raw);
        assert_eq!(outcome.exit_code(), 0, "{}", raw);
        assert_eq!(uploader.calls(), 1, "{}", raw);
        assert_eq!(
            h.notifier.messages(),
            vec!["✅ TikTok upload complete: 1/1 shorts uploaded".to_string()],
            "{}",
            raw
        );
        assert!(h.entries().is_empty(), "{:?}", h.entries());
    }
}

#[tokio::test]
async fn non_object_manifest_exits_with_data_error() {
    let h = Harness::new();
    std::fs::write(h.store.pending_path(Platform::Instagram), b"[{\"path\": \"/o/a.mp4\"}]").unwrap();
    let uploader = FakeUploader::returning(counts(1, 1));

    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::Instagram)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), exit_codes::DATA_ERR);
    assert_eq!(uploader.calls(), 0);
    assert!(h.entries().is_empty());
}

#[tokio::test]
async fn timeout_reports_124_and_releases_lock() {
    let h = Harness::new();
    h.enqueue(Platform::TikTok, 1).await;
    let uploader = FakeUploader::slow(counts(1, 1), Duration::from_secs(30));

    let outcome = h
        .watcher(uploader, Duration::from_millis(100))
        .run_once(Platform::TikTok)
        .await
        .unwrap();

    match &outcome {
        WatchOutcome::Completed(report) => assert!(report.timed_out),
        other => panic!("expected a completed run, got {:?}", other),
    }
    assert_eq!(outcome.exit_code(), exit_codes::TIMEOUT);
    assert!(!h.lock.path(Platform::TikTok).exists());
    assert!(h.notifier.messages()[0].starts_with("❌ TikTok upload failed"));
    assert!(h.entries().is_empty());
}

#[tokio::test]
async fn concurrent_runs_upload_exactly_once() {
    let h = Harness::new();
    h.enqueue(Platform::TikTok, 2).await;
    let uploader = FakeUploader::slow(counts(2, 2), Duration::from_millis(300));
    let watcher = h.watcher(uploader.clone(), Duration::from_secs(30));

    let first = tokio::spawn({
        let watcher = watcher.clone();
        async move { watcher.run_once(Platform::TikTok).await }
    });
    let second = tokio::spawn({
        let watcher = watcher.clone();
        async move { watcher.run_once(Platform::TikTok).await }
    });

    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

    assert_eq!(uploader.calls(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| matches!(o, WatchOutcome::Completed(_))).count(),
        1
    );
    assert!(outcomes.iter().all(|o| o.exit_code() == 0));
    assert_eq!(h.notifier.messages().len(), 1);
    assert!(h.entries().is_empty());
}

#[tokio::test]
async fn platforms_run_independently() {
    let h = Harness::new();
    h.enqueue(Platform::TikTok, 1).await;
    h.enqueue(Platform::YouTube, 1).await;
    // Another run is busy with Instagram.
    std::fs::write(h.lock.path(Platform::Instagram), b"{}").unwrap();

    let uploader = FakeUploader::slow(counts(1, 1), Duration::from_millis(200));
    let watcher = h.watcher(uploader.clone(), Duration::from_secs(30));

    let started = std::time::Instant::now();
    let (tiktok, youtube) = tokio::join!(
        watcher.run_once(Platform::TikTok),
        watcher.run_once(Platform::YouTube)
    );

    assert!(matches!(tiktok.unwrap(), WatchOutcome::Completed(_)));
    assert!(matches!(youtube.unwrap(), WatchOutcome::Completed(_)));
    assert_eq!(uploader.calls(), 2);
    // Both uploads overlapped rather than queueing behind one another.
    assert!(started.elapsed() < Duration::from_millis(390));

    let seen = uploader.seen.lock().unwrap().clone();
    assert!(seen.contains(&(Platform::TikTok, h.store.claimed_path(Platform::TikTok))));
    assert!(seen.contains(&(Platform::YouTube, h.store.claimed_path(Platform::YouTube))));
    assert_eq!(h.entries(), vec![".instagram_uploading".to_string()]);
}

#[tokio::test]
async fn stale_lock_is_reclaimed_and_abandoned_batch_discarded() {
    let h = Harness::new();
    // A crashed run left its lock and its claimed manifest behind.
    write_aged(&h.lock.path(Platform::YouTube), b"{}", STALE_AFTER * 2);
    std::fs::write(h.store.claimed_path(Platform::YouTube), b"{\"shorts\": []}").unwrap();
    h.enqueue(Platform::YouTube, 2).await;

    let uploader = FakeUploader::returning(counts(2, 2));
    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::YouTube)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(uploader.calls(), 1);

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("stale"));
    assert!(messages[0].contains("discarded"));
    assert!(messages[1].starts_with("✅ YouTube upload complete"));
    assert!(h.entries().is_empty(), "{:?}", h.entries());
}

#[tokio::test]
async fn fresh_lock_is_never_reclaimed() {
    let h = Harness::new();
    write_aged(&h.lock.path(Platform::TikTok), b"{}", STALE_AFTER / 2);
    h.enqueue(Platform::TikTok, 1).await;

    let uploader = FakeUploader::returning(counts(1, 1));
    let outcome = h
        .watcher(uploader.clone(), Duration::from_secs(30))
        .run_once(Platform::TikTok)
        .await
        .unwrap();

    assert_eq!(outcome, WatchOutcome::Busy);
    assert_eq!(uploader.calls(), 0);
    assert!(h.lock.path(Platform::TikTok).exists());
    assert!(h.store.pending_path(Platform::TikTok).exists());
}

#[tokio::test]
async fn manifest_enqueued_during_upload_survives_retirement() {
    let h = Harness::new();
    h.enqueue(Platform::Instagram, 1).await;
    let uploader = FakeUploader::slow(counts(1, 1), Duration::from_millis(200));
    let watcher = h.watcher(uploader.clone(), Duration::from_secs(30));

    let run = tokio::spawn({
        let watcher = watcher.clone();
        async move { watcher.run_once(Platform::Instagram).await }
    });

    // Wait until the first batch has been claimed, then publish the next one.
    while h.store.peek(Platform::Instagram).await.unwrap() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    h.enqueue(Platform::Instagram, 4).await;

    run.await.unwrap().unwrap();
    assert_eq!(uploader.calls(), 1);
    assert!(h.store.peek(Platform::Instagram).await.unwrap());
}
