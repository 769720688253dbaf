//! Headless runner for the Mind Creatures simulation.

mod runner;
mod telemetry;

use anyhow::{Context, Result};
use mind_core::SimConfig;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

const DEFAULT_REPORT_PATH: &str = "run-report.json";

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_telemetry(telemetry::LogFormat::from_env())?;

    let config = load_config()?;
    config.validate()?;
    info!(
        seed = config.seed,
        num_ticks = config.num_ticks,
        width = config.world.width,
        height = config.world.height,
        "Starting Mind Creatures runner"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = {
        let stop = stop.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            stop.store(true, Ordering::Relaxed);
        })
    };

    let report = runner::execute_run(config, stop).await?;
    watcher.abort();

    let path = std::env::var("MIND_SIM_REPORT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORT_PATH));
    runner::write_report(&report, &path).await?;

    info!(
        run_id = %report.run_id,
        survivors = report.stats.population,
        births = report.totals.births,
        deaths = report.totals.deaths,
        "Runner finished"
    );
    Ok(())
}

/// Defaults, overlaid by a JSON file (`MIND_SIM_CONFIG` or the first argument)
/// and a `MIND_SIM_SEED` override
fn load_config() -> Result<SimConfig> {
    let path = std::env::var("MIND_SIM_CONFIG")
        .ok()
        .or_else(|| std::env::args().nth(1));

    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            info!(%path, "Loaded configuration file");
            serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))?
        }
        None => SimConfig::default(),
    };

    if let Ok(seed) = std::env::var("MIND_SIM_SEED") {
        config.seed = seed
            .parse()
            .with_context(|| format!("MIND_SIM_SEED is not an unsigned integer: {seed:?}"))?;
    }

    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Shutdown signal received, finishing the current tick");
}
