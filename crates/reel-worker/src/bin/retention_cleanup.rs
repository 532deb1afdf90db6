//! Retention cleanup binary.
//!
//! Resets the pipeline's working directories and deletes output files older
//! than the retention window. Takes no arguments; run it from a scheduler.

use tracing::{info, warn};

use reel_storage::{run_cleanup, RetentionConfig};
use reel_worker::{init_tracing, load_env_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    init_tracing();

    let config = RetentionConfig::from_env();
    info!("Cleanup config: {:?}", config);

    let report = run_cleanup(&config)
        .await
        .map_err(|e| anyhow::anyhow!("cleanup failed: {}", e))?;

    if report.errors > 0 {
        warn!(errors = report.errors, "Cleanup finished with per-file errors");
    }
    info!("Cleanup report: {}", serde_json::to_string(&report)?);

    println!("Cleanup completed at {}", chrono::Utc::now().to_rfc3339());
    Ok(())
}
