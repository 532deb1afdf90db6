//! Human-readable upload summaries.

use std::time::Duration;

use reel_models::{Platform, UploadReport};

/// Webhook content limit (Discord rejects longer messages).
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Outcome of one upload batch, reduced to what a human needs to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub platform: Platform,
    pub success: bool,
    pub uploaded: Option<u64>,
    pub total: Option<u64>,
    pub error: Option<String>,
}

impl UploadSummary {
    pub fn new(platform: Platform, success: bool) -> Self {
        Self {
            platform,
            success,
            uploaded: None,
            total: None,
            error: None,
        }
    }

    pub fn with_counts(mut self, uploaded: u64, total: u64) -> Self {
        self.uploaded = Some(uploaded);
        self.total = Some(total);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Summarise an uploader report.
    pub fn from_report(platform: Platform, report: &UploadReport) -> Self {
        Self {
            platform,
            success: report.is_success(),
            uploaded: report.uploaded(),
            total: report.total(),
            error: if report.is_success() {
                None
            } else {
                report.error_detail()
            },
        }
    }

    /// `uploaded/total`, or `?/?` when either count is unknown.
    pub fn counts(&self) -> String {
        match (self.uploaded, self.total) {
            (Some(uploaded), Some(total)) => format!("{}/{}", uploaded, total),
            _ => "?/?".to_string(),
        }
    }

    fn is_partial(&self) -> bool {
        matches!((self.uploaded, self.total), (Some(u), Some(t)) if u < t)
    }

    /// Render the notification text, capped at [`MAX_MESSAGE_CHARS`].
    pub fn message(&self) -> String {
        let name = self.platform.display_name();
        let counts = self.counts();

        let head = if !self.success {
            format!("❌ {} upload failed: {} shorts uploaded", name, counts)
        } else if self.is_partial() {
            format!("⚠️ {} upload partially complete: {} shorts uploaded", name, counts)
        } else {
            format!("✅ {} upload complete: {} shorts uploaded", name, counts)
        };

        match self.error.as_deref().map(str::trim) {
            Some(error) if !error.is_empty() => {
                let prefix = format!("{}. Error: ", head);
                let budget = MAX_MESSAGE_CHARS.saturating_sub(prefix.chars().count());
                format!("{}{}", prefix, truncate_chars(error, budget))
            }
            _ => head,
        }
    }
}

/// Warning sent when a watcher reclaims a lock left by a dead run.
pub fn stale_lock_message(platform: Platform, age: Duration, discarded_manifest: bool) -> String {
    let minutes = age.as_secs() / 60;
    let mut message = format!(
        "⚠️ {} upload lock was stale ({} min old) and has been reclaimed",
        platform.display_name(),
        minutes
    );
    if discarded_manifest {
        message.push_str("; the interrupted batch was discarded and needs a manual re-upload");
    }
    message
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}
