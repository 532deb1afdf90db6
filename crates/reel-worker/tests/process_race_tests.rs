//! Two `upload-watcher` processes racing over one queue directory.

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;

use reel_models::Platform;

const UPLOADER_SCRIPT: &str = r#"echo "$2" >> "$UPLOAD_COUNTER"
sleep 1
echo '{"success": true, "uploaded": 1, "total": 1}'
"#;

fn watcher_command(base: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_upload-watcher"));
    command
        .arg("tiktok")
        .env("REEL_ENV_FILE", base.join("empty.env"))
        .env("REEL_QUEUE_DIR", base.join("queue"))
        .env(
            "REEL_UPLOADER_TIKTOK_CMD",
            format!("sh {}", base.join("upload.sh").display()),
        )
        .env("UPLOAD_COUNTER", base.join("uploads.log"))
        .env_remove("NOTIFY_WEBHOOK_URL")
        .env_remove("DISCORD_WEBHOOK_URL")
        .env_remove("REEL_UPLOAD_TIMEOUT_SECS")
        .env_remove("REEL_STALE_LOCK_SECS")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

#[test]
fn two_processes_upload_a_manifest_once() {
    let base = TempDir::new().unwrap();
    let queue = base.path().join("queue");
    std::fs::create_dir_all(&queue).unwrap();
    std::fs::write(base.path().join("empty.env"), b"").unwrap();
    std::fs::write(base.path().join("upload.sh"), UPLOADER_SCRIPT).unwrap();
    std::fs::write(
        queue.join(Platform::TikTok.manifest_file_name()),
        br#"{"shorts": [{"path": "/pipeline/output/shorts/a.mp4", "title": "A"}]}"#,
    )
    .unwrap();

    let mut first = watcher_command(base.path()).spawn().unwrap();
    let mut second = watcher_command(base.path()).spawn().unwrap();

    let first = first.wait().unwrap();
    let second = second.wait().unwrap();
    assert_eq!(first.code(), Some(0));
    assert_eq!(second.code(), Some(0));

    let uploads = std::fs::read_to_string(base.path().join("uploads.log")).unwrap();
    let claimed = queue.join(Platform::TikTok.claimed_manifest_file_name());
    assert_eq!(uploads.lines().collect::<Vec<_>>(), vec![claimed.display().to_string()]);

    // Manifest and lock are both retired.
    assert_eq!(std::fs::read_dir(&queue).unwrap().count(), 0);
}
