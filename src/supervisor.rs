// src/supervisor.rs
//
// Supervisor policy, kept free of process spawning so the escalation
// ladder is unit-testable. The binary in src/bin/supervisor.rs owns the
// actual launch loop and only asks this module what to do next.
//
// The ladder: transient failure -> in-process restart; repeated
// low-level crashes or a detected pipeline wedge -> reboot; operator
// stop -> full halt.

use crate::bootstate::BootScopedCounter;
use crate::checkpoint::Checkpoint;
use crate::protocol::ExitClass;
use chrono::{DateTime, Local, NaiveTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// What the supervisor does after a pipeline exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    /// Stop the loop entirely.
    Halt,
    /// Reboot the host.
    Reboot,
    /// Relaunch the pipeline after the delay.
    Restart { delay: Duration },
}

/// Seed and bootstrap settings for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSeed {
    pub seed_occupancy: u32,
    pub bootstrap_duration_s: f64,
}

/// Warm/cold decision: a fresh checkpoint is trusted outright (warm
/// start, no bootstrap window); anything else starts cold with the
/// configured seed and the full bootstrap window.
pub fn resolve_seed(
    checkpoint: Option<&Checkpoint>,
    now: DateTime<Utc>,
    ttl_s: u64,
    cold_seed: u32,
    bootstrap_duration_s: f64,
) -> RunSeed {
    match checkpoint {
        Some(checkpoint) if checkpoint.is_fresh(ttl_s, now) => {
            info!(
                occupancy = checkpoint.occupancy,
                "warm start from fresh checkpoint"
            );
            RunSeed {
                seed_occupancy: checkpoint.occupancy,
                bootstrap_duration_s: 0.0,
            }
        }
        Some(_) => {
            info!("checkpoint stale, cold start");
            RunSeed {
                seed_occupancy: cold_seed,
                bootstrap_duration_s,
            }
        }
        None => {
            info!("no checkpoint, cold start");
            RunSeed {
                seed_occupancy: cold_seed,
                bootstrap_duration_s,
            }
        }
    }
}

/// How long to block before today's scheduled start. Zero once the start
/// time has passed — the gate is only checked once per launch.
pub fn delay_until_start(start: NaiveTime, now: DateTime<Local>) -> Duration {
    let current = now.time();
    if current >= start {
        return Duration::ZERO;
    }
    (start - current).to_std().unwrap_or(Duration::ZERO)
}

pub struct SupervisorPolicy {
    max_crash_retries: u32,
    restart_delay: Duration,
    crash_counter: BootScopedCounter,
}

impl SupervisorPolicy {
    pub fn new(
        max_crash_retries: u32,
        restart_delay: Duration,
        crash_counter: BootScopedCounter,
    ) -> Self {
        Self {
            max_crash_retries,
            restart_delay,
            crash_counter,
        }
    }

    /// Apply the escalation ladder to one pipeline exit.
    pub fn on_exit(&self, class: ExitClass) -> SupervisorAction {
        match class {
            ExitClass::OperatorStop => SupervisorAction::Halt,
            ExitClass::WatchdogExhausted => SupervisorAction::Reboot,
            ExitClass::Crash => {
                let crashes = match self.crash_counter.increment() {
                    Ok(count) => count,
                    Err(error) => {
                        // If the ladder cannot be recorded, err toward
                        // the stronger recovery.
                        warn!(%error, "crash counter update failed");
                        u64::from(self.max_crash_retries)
                    }
                };
                if crashes >= u64::from(self.max_crash_retries) {
                    SupervisorAction::Reboot
                } else {
                    SupervisorAction::Restart {
                        delay: self.restart_delay,
                    }
                }
            }
            ExitClass::Transient => {
                if let Err(error) = self.crash_counter.reset() {
                    warn!(%error, "crash counter reset failed");
                }
                SupervisorAction::Restart {
                    delay: self.restart_delay,
                }
            }
        }
    }
}
