//! Stream Detector - Main Entry Point
//!
//! Reads one JSON command per stdin line, writes one JSON reply per line.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Handle;

use stream_detector_core::api::commands::{self, Reply};
use stream_detector_core::constants::{APP_NAME, APP_VERSION};
use stream_detector_core::{DetectorConfig, Registry};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let defaults = DetectorConfig::from_env();
    if let Err(e) = defaults.validate() {
        log::error!("Environment config rejected: {}", e);
        std::process::exit(2);
    }

    let registry = Registry::new(Handle::current()).with_default_config(defaults);
    let defaults = registry.default_config();

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);
    log::info!(
        "Defaults: min_samples={}, retrain_interval={}, window_size={}, backend={}",
        defaults.min_samples,
        defaults.retrain_interval,
        defaults.window_size,
        defaults.backend.as_str()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = commands::handle_line(&registry, line);
        let encoded = serde_json::to_string(&reply).unwrap_or_else(|e| {
            serde_json::to_string(&Reply::failure(format!("Failed to encode reply: {}", e)))
                .unwrap_or_default()
        });

        stdout.write_all(encoded.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    log::info!("stdin closed, waiting for in-flight retrains...");
    registry.wait_idle().await;
    log::info!("Shutdown complete ({} detectors)", registry.len());
    Ok(())
}
