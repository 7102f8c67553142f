// src/bin/supervisor.rs
//
// The outer lifecycle loop. Launched once per boot (systemd unit or
// rc.local); never shares memory with the pipeline — it sees only the
// on-disk checkpoint and the pipeline's final exit status.
//
// Per cycle: wait for the scheduled start, kill leftover processes
// still holding the camera/accelerator, decide warm vs. cold seeding
// from the checkpoint, launch the pipeline, then apply the escalation
// ladder to its exit status.

use anyhow::{Context, Result};
use chrono::{Local, NaiveTime, Utc};
use occupancy_edge::bootstate::BootScopedCounter;
use occupancy_edge::checkpoint::CheckpointStore;
use occupancy_edge::config::Config;
use occupancy_edge::protocol::ExitClass;
use occupancy_edge::supervisor::{delay_until_start, resolve_seed, SupervisorAction, SupervisorPolicy};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
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
                    EnvFilter::new(format!("occupancy_edge={level},occupancy_supervisor={level}"))
                }),
        )
        .init();

    info!(config = %config_path.display(), "supervisor starting");

    // Boot start: clear both boot-scoped counters. The supervisor runs
    // once per boot, so this is the counters' explicit reset lifecycle.
    let freeze_counter = BootScopedCounter::new(config.watchdog.counter_path.clone());
    let crash_counter = BootScopedCounter::new(config.supervisor.crash_counter_path.clone());
    freeze_counter
        .reset()
        .context("clearing freeze counter at boot")?;
    crash_counter
        .reset()
        .context("clearing crash counter at boot")?;

    let policy = SupervisorPolicy::new(
        config.supervisor.max_crash_retries,
        Duration::from_secs(config.supervisor.restart_delay_s),
        crash_counter,
    );
    let store = CheckpointStore::new(config.checkpoint.path.clone());

    loop {
        wait_for_scheduled_start(&config)?;
        cleanup_leftovers(&config);

        let checkpoint = match store.load() {
            Ok(checkpoint) => checkpoint,
            Err(error) => {
                // A corrupt checkpoint is a cold start, not a fatal error
                warn!(%error, "checkpoint unreadable, starting cold");
                None
            }
        };
        let seed = resolve_seed(
            checkpoint.as_ref(),
            Utc::now(),
            config.checkpoint.ttl_s,
            config.counting.seed_occupancy,
            config.counting.bootstrap_duration_s,
        );

        let status = run_pipeline(&config, seed.seed_occupancy, seed.bootstrap_duration_s)?;
        let class = ExitClass::classify(status);
        info!(code = ?status, class = class.as_str(), "pipeline exited");

        match policy.on_exit(class) {
            SupervisorAction::Halt => {
                info!("operator stop, supervisor halting");
                return Ok(());
            }
            SupervisorAction::Reboot => {
                error!("recovery exhausted, rebooting host");
                reboot(&config);
                return Ok(());
            }
            SupervisorAction::Restart { delay } => {
                info!(delay_s = delay.as_secs(), "restarting pipeline");
                std::thread::sleep(delay);
            }
        }
    }
}

/// Block until the configured local start time. Checked once per launch.
fn wait_for_scheduled_start(config: &Config) -> Result<()> {
    let Some(start) = &config.supervisor.start_time else {
        return Ok(());
    };
    let start = NaiveTime::parse_from_str(start, "%H:%M")
        .with_context(|| format!("start_time {start:?}"))?;
    let wait = delay_until_start(start, Local::now());
    if !wait.is_zero() {
        info!(wait_s = wait.as_secs(), "waiting for scheduled start");
        std::thread::sleep(wait);
    }
    Ok(())
}

/// Kill anything from an incomplete prior run that may still hold the
/// camera or the accelerator, then give the driver time to release it.
fn cleanup_leftovers(config: &Config) {
    for pattern in &config.supervisor.cleanup_patterns {
        match Command::new("pkill").args(["-9", "-f", pattern]).status() {
            Ok(status) if status.success() => {
                info!(pattern = %pattern, "killed leftover processes");
            }
            Ok(_) => {} // pkill exits 1 when nothing matched
            Err(error) => warn!(%error, pattern = %pattern, "pkill failed"),
        }
    }
    if !config.supervisor.cleanup_patterns.is_empty() {
        std::thread::sleep(Duration::from_secs(config.supervisor.cleanup_settle_s));
    }
}

/// Launch the pipeline and wait for it. Returns its exit code, or None
/// when it was killed by a signal.
fn run_pipeline(config: &Config, seed: u32, bootstrap_s: f64) -> Result<Option<i32>> {
    let argv = &config.supervisor.pipeline_cmd;
    info!(cmd = ?argv, seed, bootstrap_s, "launching pipeline");
    let status = Command::new(&argv[0])
        .args(&argv[1..])
        .env("SEED_OCCUPANCY", seed.to_string())
        .env("BOOTSTRAP_SECS", bootstrap_s.to_string())
        .status()
        .with_context(|| format!("spawning pipeline {:?}", argv[0]))?;
    Ok(status.code())
}

fn reboot(config: &Config) {
    let argv = &config.supervisor.reboot_cmd;
    if argv.is_empty() {
        error!("no reboot_cmd configured, halting instead");
        return;
    }
    if let Err(error) = Command::new(&argv[0]).args(&argv[1..]).status() {
        error!(%error, cmd = ?argv, "reboot command failed");
    }
}
