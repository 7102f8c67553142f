// src/watchdog.rs
//
// Liveness watchdog. The frame path bumps a heartbeat timestamp on every
// received frame; the watchdog is a separately scheduled task that only
// ever reads that atomic and maintains its own boot-scoped freeze
// counter, so it can still act when the frame path is wedged inside a
// stuck driver call.
//
// Escalation: freeze #1 and #2 terminate with the same status a graceful
// operator interrupt produces, which the supervisor classifies as
// transient and answers with a relaunch. Freeze #3 terminates with the
// reserved watchdog-exhausted status — a wedged camera or accelerator
// driver usually needs a cold boot to clear, and the supervisor reboots.

use crate::bootstate::BootScopedCounter;
use crate::protocol::{EXIT_INTERRUPTED, EXIT_WATCHDOG_EXHAUSTED};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::error;

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Shared frame-arrival heartbeat. Cloning is cheap; the frame path and
/// the watchdog hold clones of the same atomic.
#[derive(Clone)]
pub struct Heartbeat(Arc<AtomicU64>);

impl Heartbeat {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(epoch_millis())))
    }

    /// Called by the frame path on every received frame.
    pub fn beat(&self) {
        self.0.store(epoch_millis(), Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        let last = self.0.load(Ordering::Relaxed);
        Duration::from_millis(epoch_millis().saturating_sub(last))
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

/// What a detected freeze escalates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeAction {
    /// Terminate so the supervisor relaunches the process.
    RequestRestart,
    /// Terminate with the reserved status so the supervisor reboots.
    RequestReboot,
}

impl FreezeAction {
    /// Freeze count within this boot -> escalation step.
    pub fn for_freeze_count(count: u64) -> Self {
        if count >= 3 {
            Self::RequestReboot
        } else {
            Self::RequestRestart
        }
    }

    pub fn exit_status(&self) -> i32 {
        match self {
            Self::RequestRestart => EXIT_INTERRUPTED,
            Self::RequestReboot => EXIT_WATCHDOG_EXHAUSTED,
        }
    }
}

pub struct Watchdog {
    heartbeat: Heartbeat,
    freeze_timeout: Duration,
    counter: BootScopedCounter,
}

impl Watchdog {
    pub fn new(heartbeat: Heartbeat, freeze_timeout: Duration, counter: BootScopedCounter) -> Self {
        Self {
            heartbeat,
            freeze_timeout,
            counter,
        }
    }

    /// Spawn the observer task. It ticks once a second and exits the
    /// whole process when the heartbeat goes stale.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let stale = self.heartbeat.elapsed();
                if stale <= self.freeze_timeout {
                    continue;
                }

                // Counter write failures still escalate: a freeze we
                // cannot record is treated as the first one.
                let count = match self.counter.increment() {
                    Ok(count) => count,
                    Err(write_error) => {
                        error!(%write_error, "freeze counter update failed");
                        1
                    }
                };
                let action = FreezeAction::for_freeze_count(count);
                error!(
                    stale_secs = stale.as_secs(),
                    freeze_count = count,
                    ?action,
                    "no frames received — pipeline frozen"
                );
                // Direct exit: the frame path may be stuck in a driver
                // call and cannot be asked to shut down cooperatively.
                std::process::exit(action.exit_status());
            }
        })
    }
}
