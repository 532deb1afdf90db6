//! Upload watcher binary.
//!
//! `upload-watcher [--loop] <platform>...|--all`
//!
//! Without `--loop` every named platform gets one `run_once` pass and the
//! process exits with the first non-zero outcome code. With `--loop` passes
//! repeat every `REEL_WATCH_INTERVAL_SECS` until interrupted.

use std::sync::Arc;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use reel_models::{exit_codes, Platform, WatchOutcome};
use reel_notify::build_notifier;
use reel_worker::{
    init_tracing, load_env_file, ProcessUploader, UploadWatcher, WatcherConfig, WorkerError,
    WorkerResult,
};

const USAGE: &str = "upload-watcher [--loop] <platform>...|--all";

#[derive(Debug, PartialEq, Eq)]
struct Args {
    platforms: Vec<Platform>,
    run_loop: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> WorkerResult<Args> {
    let mut platforms = Vec::new();
    let mut run_loop = false;
    let mut all = false;

    for arg in args {
        match arg.as_str() {
            "--loop" => run_loop = true,
            "--all" => all = true,
            "-h" | "--help" => return Err(WorkerError::usage(USAGE)),
            flag if flag.starts_with('-') => {
                return Err(WorkerError::usage(format!("unknown option {}; {}", flag, USAGE)))
            }
            name => {
                let platform: Platform = name
                    .parse()
                    .map_err(|e| WorkerError::usage(format!("{}; {}", e, USAGE)))?;
                if !platforms.contains(&platform) {
                    platforms.push(platform);
                }
            }
        }
    }

    if all {
        if !platforms.is_empty() {
            return Err(WorkerError::usage(format!("--all takes no platforms; {}", USAGE)));
        }
        platforms = Platform::ALL.to_vec();
    }
    if platforms.is_empty() {
        return Err(WorkerError::usage(USAGE));
    }

    Ok(Args { platforms, run_loop })
}

/// One pass over every platform, concurrently. Returns the first non-zero
/// exit code in platform order, or 0.
async fn run_pass(watcher: &UploadWatcher, platforms: &[Platform]) -> i32 {
    let results = join_all(platforms.iter().map(|platform| {
        let watcher = watcher.clone();
        let platform = *platform;
        async move { (platform, watcher.run_once(platform).await) }
    }))
    .await;

    let mut exit_code = exit_codes::SUCCESS;
    for (platform, result) in results {
        let code = match result {
            Ok(outcome) => {
                if let WatchOutcome::Completed(report) = &outcome {
                    info!(
                        platform = %platform,
                        exit_code = report.exit_code,
                        outcome = outcome.label(),
                        "Upload run finished"
                    );
                }
                outcome.exit_code()
            }
            Err(e) => {
                error!(platform = %platform, "Watcher run failed: {}", e);
                e.exit_code()
            }
        };
        if exit_code == exit_codes::SUCCESS {
            exit_code = code;
        }
    }
    exit_code
}

#[tokio::main]
async fn main() {
    load_env_file();
    init_tracing();

    // Install rustls crypto provider (required for HTTPS webhooks)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    let config = WatcherConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(e.exit_code());
    }
    info!("Watcher config: {:?}", config);

    let notifier = match build_notifier(&config.notify) {
        Ok(notifier) => notifier,
        Err(e) => {
            let e = WorkerError::from(e);
            error!("Failed to create notifier: {}", e);
            std::process::exit(e.exit_code());
        }
    };
    let uploader = Arc::new(ProcessUploader::new(config.uploaders.clone()));
    let watcher = UploadWatcher::from_config(&config, uploader, notifier);

    if !args.run_loop {
        let code = run_pass(&watcher, &args.platforms).await;
        std::process::exit(code);
    }

    info!(
        interval_secs = config.watch_interval.as_secs(),
        "Starting upload watcher loop for {:?}", args.platforms
    );

    let mut ticker = tokio::time::interval(config.watch_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let code = run_pass(&watcher, &args.platforms).await;
                if code != exit_codes::SUCCESS {
                    warn!(exit_code = code, "Watcher pass finished with failures");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("Upload watcher shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> WorkerResult<Args> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_single_platform() {
        let args = parse(&["tiktok"]).unwrap();
        assert_eq!(args.platforms, vec![Platform::TikTok]);
        assert!(!args.run_loop);
    }

    #[test]
    fn test_all_with_loop() {
        let args = parse(&["--loop", "--all"]).unwrap();
        assert_eq!(args.platforms, Platform::ALL.to_vec());
        assert!(args.run_loop);
    }

    #[test]
    fn test_duplicates_collapsed() {
        let args = parse(&["youtube", "yt", "instagram"]).unwrap();
        assert_eq!(args.platforms, vec![Platform::YouTube, Platform::Instagram]);
    }

    #[test]
    fn test_usage_errors() {
        let cases: [&[&str]; 4] = [&[], &["myspace"], &["--verbose", "tiktok"], &["--all", "tiktok"]];
        for bad in cases {
            let err = parse(bad).unwrap_err();
            assert_eq!(err.exit_code(), exit_codes::USAGE, "{:?}", bad);
        }
    }
}
