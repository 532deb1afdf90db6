//! Uploader results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured result printed by a platform uploader on stdout.
///
/// Every field is optional: uploaders report `{"uploaded": n, "total": m}` on
/// success and `{"success": false, "error": "..."}` when they bail out early.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UploadResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub fn counts(uploaded: u64, total: u64) -> Self {
        Self {
            success: None,
            uploaded: Some(uploaded),
            total: Some(total),
            error: None,
        }
    }

    /// Parse uploader stdout.
    ///
    /// Tolerates log noise around the JSON object. Returns `None` when no JSON
    /// object can be found; counts that are missing or not non-negative
    /// integers are left as `None`.
    pub fn parse_output(stdout: &str) -> Option<Self> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return None;
        }

        let value = serde_json::from_str::<Value>(trimmed).ok().or_else(|| {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            if end <= start {
                return None;
            }
            serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
        })?;

        let object = value.as_object()?;
        let error = match object.get("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Some(Self {
            success: object.get("success").and_then(Value::as_bool),
            uploaded: object.get("uploaded").and_then(Value::as_u64),
            total: object.get("total").and_then(Value::as_u64),
            error,
        })
    }

    /// Both counts, if the uploader reported them.
    pub fn known_counts(&self) -> Option<(u64, u64)> {
        Some((self.uploaded?, self.total?))
    }
}

/// Everything the watcher learns from one uploader invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UploadReport {
    /// Process exit code (124 on timeout, 127 when the uploader could not start)
    pub exit_code: i32,
    /// Parsed stdout result, if any
    pub result: Option<UploadResult>,
    /// Diagnostic text (tail of stderr, or the reason the attempt failed)
    pub diagnostics: Option<String>,
    /// Whether the uploader was killed for exceeding its timeout
    #[serde(default)]
    pub timed_out: bool,
}

impl UploadReport {
    pub fn new(exit_code: i32, result: Option<UploadResult>) -> Self {
        Self {
            exit_code,
            result,
            diagnostics: None,
            timed_out: false,
        }
    }

    /// A report for an attempt that failed before or outside the uploader.
    pub fn failed(exit_code: i32, reason: impl Into<String>) -> Self {
        Self {
            exit_code,
            result: None,
            diagnostics: Some(reason.into()),
            timed_out: false,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        let diagnostics = diagnostics.into();
        if !diagnostics.trim().is_empty() {
            self.diagnostics = Some(diagnostics);
        }
        self
    }

    /// An attempt succeeded when the uploader exited 0 and did not report
    /// `success: false`. Partial batches still count as success.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
            && self
                .result
                .as_ref()
                .and_then(|r| r.success)
                .unwrap_or(true)
    }

    pub fn uploaded(&self) -> Option<u64> {
        self.result.as_ref().and_then(|r| r.uploaded)
    }

    pub fn total(&self) -> Option<u64> {
        self.result.as_ref().and_then(|r| r.total)
    }

    /// Best available error text: the uploader's own error, else diagnostics.
    pub fn error_detail(&self) -> Option<String> {
        self.result
            .as_ref()
            .and_then(|r| r.error.clone())
            .or_else(|| self.diagnostics.clone())
    }
}
