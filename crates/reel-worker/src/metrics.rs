//! Watcher metrics.
//!
//! Counters are no-ops unless the host process installs a recorder.

use ::metrics::counter;

use reel_models::{Platform, WatchOutcome};

/// Metric name constants for consistency.
pub mod names {
    /// Watcher invocations by platform and outcome.
    pub const WATCH_RUNS_TOTAL: &str = "reel_watch_runs_total";

    /// Items reported uploaded by platform.
    pub const ITEMS_UPLOADED_TOTAL: &str = "reel_items_uploaded_total";

    /// Stale locks reclaimed by platform.
    pub const STALE_LOCKS_RECLAIMED_TOTAL: &str = "reel_stale_locks_reclaimed_total";
}

/// Record the end of one watcher invocation.
pub fn record_run(platform: Platform, outcome: &WatchOutcome) {
    counter!(
        names::WATCH_RUNS_TOTAL,
        "platform" => platform.as_str(),
        "outcome" => outcome.label()
    )
    .increment(1);

    if let WatchOutcome::Completed(report) = outcome {
        if let Some(uploaded) = report.uploaded() {
            counter!(names::ITEMS_UPLOADED_TOTAL, "platform" => platform.as_str()).increment(uploaded);
        }
    }
}

/// Record reclamation of an abandoned lock.
pub fn record_stale_reclaim(platform: Platform) {
    counter!(names::STALE_LOCKS_RECLAIMED_TOTAL, "platform" => platform.as_str()).increment(1);
}
