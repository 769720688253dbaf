//! Executes a simulation run off the async runtime and builds its report.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mind_core::{PopulationStats, RunTotals, SimConfig};
use mind_world::{Simulation, WorldSnapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// Everything worth keeping from one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ticks_run: u64,
    pub stopped_early: bool,
    pub config: SimConfig,
    pub totals: RunTotals,
    pub stats: PopulationStats,
    pub snapshot: WorldSnapshot,
}

/// Run the configured simulation on a blocking thread.
///
/// Once `stop` is set no further ticks are issued; the report covers the
/// ticks that ran.
#[instrument(skip(config, stop), fields(seed = config.seed, num_ticks = config.num_ticks))]
pub async fn execute_run(config: SimConfig, stop: Arc<AtomicBool>) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = Instant::now();
    info!(event = "run_accepted", %run_id, "Executing run");

    let sim_config = config.clone();
    let (result, snapshot) = tokio::task::spawn_blocking(move || {
        let mut sim = Simulation::new(sim_config)?;
        let result = sim.run_while(|| !stop.load(Ordering::Relaxed));
        Ok::<_, mind_core::Error>((result, sim.snapshot()))
    })
    .await??;

    let duration = start.elapsed();
    info!(
        event = "run_finished",
        %run_id,
        ticks_run = result.ticks_run,
        stopped_early = result.stopped_early,
        duration_secs = duration.as_secs_f64(),
        "Run completed in {:.2}s",
        duration.as_secs_f64()
    );

    Ok(RunReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        ticks_run: result.ticks_run,
        stopped_early: result.stopped_early,
        config,
        totals: result.totals,
        stats: result.stats,
        snapshot,
    })
}

pub async fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing run report to {}", path.display()))?;
    info!(event = "report_written", path = %path.display(), "Run report written");
    Ok(())
}
