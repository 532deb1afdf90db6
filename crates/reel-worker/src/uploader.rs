//! Platform uploader adapter.
//!
//! Uploaders are external programs invoked as
//! `<program> <args...> --manifest <path> [--max N]`. They print a JSON
//! object such as `{"uploaded": 2, "total": 3}` on stdout and log to stderr.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use reel_models::{exit_codes, Platform, UploadReport, UploadResult};

/// Lines of uploader stderr kept for notifications.
const STDERR_TAIL_LINES: usize = 20;

/// Publishes one manifest's batch to a platform.
///
/// Never fails: every problem, including being unable to start, is reported
/// through the returned [`UploadReport`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, platform: Platform, manifest_path: &Path) -> UploadReport;
}

/// Command line for one platform's uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Passed as `--max N` to cap the batch size
    pub max_uploads: Option<u32>,
}

impl UploaderCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            max_uploads: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `python3 /pipeline/scripts/upload_<platform>.py`
    pub fn default_for(platform: Platform) -> Self {
        Self::new("python3").arg(format!("/pipeline/scripts/upload_{}.py", platform.as_str()))
    }

    /// Split a whitespace-separated command line. `None` if it is blank.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            max_uploads: None,
        })
    }

    /// Full argument list for a manifest.
    pub fn build_args(&self, manifest_path: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--manifest".to_string());
        args.push(manifest_path.to_string_lossy().to_string());
        if let Some(max) = self.max_uploads {
            args.push("--max".to_string());
            args.push(max.to_string());
        }
        args
    }
}

/// Runs the configured uploader program as a child process.
///
/// The child is killed if the upload future is dropped, which is how the
/// watcher's timeout ends a hung upload.
#[derive(Debug, Clone)]
pub struct ProcessUploader {
    commands: HashMap<Platform, UploaderCommand>,
}

impl ProcessUploader {
    pub fn new(commands: HashMap<Platform, UploaderCommand>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl Uploader for ProcessUploader {
    async fn upload(&self, platform: Platform, manifest_path: &Path) -> UploadReport {
        let Some(command) = self.commands.get(&platform) else {
            return UploadReport::failed(
                exit_codes::SPAWN_FAILED,
                format!("no uploader configured for {}", platform),
            );
        };

        let program = match which::which(&command.program) {
            Ok(path) => path,
            Err(e) => {
                return UploadReport::failed(
                    exit_codes::SPAWN_FAILED,
                    format!("uploader {} not found: {}", command.program, e),
                )
            }
        };

        let args = command.build_args(manifest_path);
        debug!(platform = %platform, "Running uploader: {} {}", program.display(), args.join(" "));

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return UploadReport::failed(
                    exit_codes::SPAWN_FAILED,
                    format!("failed to start uploader {}: {}", program.display(), e),
                )
            }
        };

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => {
                return UploadReport::failed(
                    exit_codes::FAILURE,
                    format!("failed waiting for uploader: {}", e),
                )
            }
        };

        // Killed by a signal: no code, report as a generic failure.
        let exit_code = output.status.code().unwrap_or(exit_codes::FAILURE);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let result = UploadResult::parse_output(&stdout);
        if result.is_none() && !stdout.trim().is_empty() {
            warn!(platform = %platform, exit_code, "Uploader output was not a JSON result");
        }

        UploadReport::new(exit_code, result).with_diagnostics(tail_lines(&stderr, STDERR_TAIL_LINES))
    }
}

fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
