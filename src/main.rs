// src/main.rs
//
// The counting process. Reads one JSON frame batch per stdin line from
// the external detector/tracker, feeds the counting engine, and reports
// accepted occupancy changes. The watchdog runs alongside; signals and
// end-of-input map onto the exit-status protocol the supervisor
// interprets.
//
// Run parameters the supervisor resolves per launch arrive as
// environment variables: SEED_OCCUPANCY (warm/cold seed) and
// BOOTSTRAP_SECS (zero for a warm start).

use anyhow::{Context, Result};
use occupancy_edge::backend::OccupancyReporter;
use occupancy_edge::bootstate::BootScopedCounter;
use occupancy_edge::checkpoint::CheckpointStore;
use occupancy_edge::config::Config;
use occupancy_edge::counter::OccupancyCounter;
use occupancy_edge::engine::CountingEngine;
use occupancy_edge::protocol::{EXIT_INTERRUPTED, EXIT_OPERATOR_STOP};
use occupancy_edge::types::FrameBatch;
use occupancy_edge::watchdog::{Heartbeat, Watchdog};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn env_override_u32(name: &str, default: u32) -> Result<u32> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} must be an integer, got {value:?}")),
        Err(_) => Ok(default),
    }
}

fn env_override_f64(name: &str, default: f64) -> Result<f64> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} must be a number, got {value:?}")),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    let level = &config.logging.level;
                    EnvFilter::new(format!("occupancy_edge={level},occupancy_pipeline={level}"))
                }),
        )
        .init();

    let seed = env_override_u32("SEED_OCCUPANCY", config.counting.seed_occupancy)?;
    let bootstrap_s = env_override_f64("BOOTSTRAP_SECS", config.counting.bootstrap_duration_s)?;

    info!(
        config = %config_path.display(),
        seed,
        bootstrap_s,
        capacity = config.counting.max_capacity,
        "occupancy pipeline starting"
    );

    let store = CheckpointStore::new(config.checkpoint.path.clone());
    let counter = OccupancyCounter::new(seed, config.counting.max_capacity, store);
    let reporter = OccupancyReporter::new(&config.backend, config.counting.max_capacity);
    if reporter.is_none() {
        info!("no ingest_url configured, downstream emission disabled");
    }
    let mut engine = CountingEngine::new(
        &config,
        counter,
        reporter,
        Duration::from_secs_f64(bootstrap_s),
    );

    let heartbeat = Heartbeat::new();
    Watchdog::new(
        heartbeat.clone(),
        Duration::from_secs(config.watchdog.freeze_timeout_s),
        BootScopedCounter::new(config.watchdog.counter_path.clone()),
    )
    .spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("installing SIGTERM handler")?;

    let exit_status = loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        // Any frame, parseable or not, proves the
                        // upstream is alive.
                        heartbeat.beat();
                        let batch: FrameBatch = match serde_json::from_str(&line) {
                            Ok(batch) => batch,
                            Err(parse_error) => {
                                warn!(%parse_error, "dropping malformed frame batch");
                                continue;
                            }
                        };
                        for change in engine.process_frame(&batch) {
                            // One JSON line per event for log scraping
                            match serde_json::to_string(&change) {
                                Ok(json) => println!("{json}"),
                                Err(serialize_error) => {
                                    error!(%serialize_error, "event serialization failed");
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        info!(occupancy = engine.occupancy(), "detection stream ended");
                        break EXIT_INTERRUPTED;
                    }
                    Err(read_error) => {
                        error!(%read_error, "detection stream read failed");
                        break EXIT_INTERRUPTED;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(occupancy = engine.occupancy(), "interrupted, shutting down");
                break EXIT_INTERRUPTED;
            }
            _ = sigterm.recv() => {
                info!(occupancy = engine.occupancy(), "operator stop requested");
                break EXIT_OPERATOR_STOP;
            }
        }
    };

    std::process::exit(exit_status);
}
