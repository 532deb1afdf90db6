//! Structured watcher logging.
//!
//! Provides consistent, structured logging for watcher runs with tracing
//! spans carrying the platform and run ID.

use tracing::{debug, error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{Platform, RunId, WatchState};

/// Install the global tracing subscriber.
///
/// `LOG_FORMAT=json` selects JSON lines; otherwise human-readable ANSI output.
/// `RUST_LOG` directives are honoured on top of `reel=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["reel=info", "upload_watcher=info", "retention_cleanup=info", "enqueue_manifest=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger for one watcher invocation.
#[derive(Debug, Clone)]
pub struct WatchLogger {
    platform: Platform,
    run_id: String,
}

impl WatchLogger {
    pub fn new(platform: Platform, run_id: &RunId) -> Self {
        Self {
            platform,
            run_id: run_id.to_string(),
        }
    }

    /// Log a state transition.
    pub fn log_state(&self, state: WatchState, message: &str) {
        info!(
            platform = %self.platform,
            run_id = %self.run_id,
            state = %state,
            "{}", message
        );
    }

    /// Log a routine event that is only interesting when debugging.
    pub fn log_debug(&self, message: &str) {
        debug!(
            platform = %self.platform,
            run_id = %self.run_id,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            platform = %self.platform,
            run_id = %self.run_id,
            "{}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            platform = %self.platform,
            run_id = %self.run_id,
            "{}", message
        );
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "watch",
            platform = %self.platform,
            run_id = %self.run_id
        )
    }
}
