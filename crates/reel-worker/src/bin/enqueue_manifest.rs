//! Publish a manifest into a platform's upload slot.
//!
//! `enqueue-manifest <platform> <manifest.json>`
//!
//! Exits 1 without touching the queue if a manifest is already pending.

use anyhow::Context;
use tracing::info;

use reel_models::{Manifest, Platform};
use reel_queue::{ManifestStore, QueueConfig};
use reel_worker::{init_tracing, load_env_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let (Some(platform), Some(source), None) = (args.next(), args.next(), args.next()) else {
        anyhow::bail!("usage: enqueue-manifest <platform> <manifest.json>");
    };

    let platform: Platform = platform.parse()?;
    let body = tokio::fs::read(&source)
        .await
        .with_context(|| format!("failed to read {}", source))?;
    let manifest = Manifest::from_slice(&body).with_context(|| format!("invalid manifest {}", source))?;

    let store = ManifestStore::from_config(&QueueConfig::from_env());
    let path = store.enqueue(platform, &manifest).await?;

    info!(
        platform = %platform,
        items = manifest.item_count(),
        "Enqueued manifest at {}",
        path.display()
    );
    Ok(())
}
