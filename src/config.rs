// src/config.rs
//
// YAML configuration with serde defaults mirroring the field defaults the
// edge deployment has been tuned to. Validation is fail-fast: malformed
// gate geometry or contradictory thresholds abort startup with a
// descriptive error instead of silently degrading counting semantics.

use crate::types::RefPoint;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gates: GatesConfig,
    pub filter: FilterConfig,
    pub counting: CountingConfig,
    pub checkpoint: CheckpointConfig,
    pub watchdog: WatchdogConfig,
    pub supervisor: SupervisorConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatesConfig {
    pub gate1: GateConfig,
    pub gate2: GateConfig,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            gate1: GateConfig {
                line_a: 85.0,
                line_b: 124.0,
                lateral_min: 484.0,
                lateral_max: 573.0,
                fallback_delta: 1,
            },
            gate2: GateConfig {
                line_a: 109.0,
                line_b: 153.0,
                lateral_min: 1464.0,
                lateral_max: 1558.0,
                fallback_delta: -1,
            },
        }
    }
}

/// Geometry of one gate: two threshold lines along the crossing axis plus
/// the lateral window that scopes it to its lane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateConfig {
    pub line_a: f32,
    pub line_b: f32,
    pub lateral_min: f32,
    pub lateral_max: f32,
    /// Delta assumed when the single-gate fallback fires for this gate
    /// and the track was never seen at the other gate. Must be +1 or -1.
    #[serde(default = "default_fallback_delta")]
    pub fallback_delta: i32,
}

fn default_fallback_delta() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_box_w: f32,
    pub min_box_h: f32,
    pub max_aspect_ratio: f32,
    /// Frames a track must have been seen before it can count.
    pub min_track_age: u32,
    /// px/s along the crossing axis. Below this the box is treated as
    /// static or jitter.
    pub min_speed: f32,
    /// px/s. Above this the displacement is more likely an identity
    /// switch than real motion.
    pub max_speed: f32,
    pub ref_point: RefPoint,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_box_w: 12.0,
            min_box_h: 12.0,
            max_aspect_ratio: 5.0,
            min_track_age: 2,
            min_speed: 1.0,
            max_speed: 600.0,
            ref_point: RefPoint::TopQuarter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    /// Extra distance the reference point must clear a line before the
    /// crossing is recognized. Applied symmetrically around each line.
    pub hysteresis_margin: f32,
    /// Minimum seconds between two accepted decisions for one track.
    pub cooldown_s: f64,
    /// Count a track lost after firing only one gate, using that gate's
    /// fallback_delta. Trades recall for correctness under partial
    /// detector coverage.
    pub single_gate_fallback: bool,
    pub max_capacity: u32,
    /// Cold-start seed, used when no fresh checkpoint exists.
    pub seed_occupancy: u32,
    /// Grace window after start during which zone state is learned
    /// without emitting deltas. Zero = warm start.
    pub bootstrap_duration_s: f64,
    /// Delay before the bootstrap window begins (camera exposure settle).
    pub bootstrap_offset_s: f64,
    /// Seconds without a sighting before a track is evicted.
    pub silence_timeout_s: f64,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            hysteresis_margin: 2.0,
            cooldown_s: 2.0,
            single_gate_fallback: false,
            max_capacity: 73,
            seed_occupancy: 0,
            bootstrap_duration_s: 30.0,
            bootstrap_offset_s: 0.0,
            silence_timeout_s: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub path: PathBuf,
    /// Max checkpoint age for a warm restart.
    pub ttl_s: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state/last.json"),
            ttl_s: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Seconds without a frame heartbeat before the pipeline is declared
    /// frozen.
    pub freeze_timeout_s: u64,
    /// Boot-scoped freeze counter. Lives on tmpfs so a reboot clears it;
    /// the supervisor also clears it explicitly at boot start.
    pub counter_path: PathBuf,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            freeze_timeout_s: 10,
            counter_path: PathBuf::from("/tmp/occupancy_edge_watchdog_count"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// "HH:MM" local time. Each launch blocks until this time is reached;
    /// unset = start immediately.
    pub start_time: Option<String>,
    /// Crash-status exits in one boot before escalating to a reboot.
    pub max_crash_retries: u32,
    pub restart_delay_s: u64,
    /// pkill -f patterns for leftover processes still holding the camera
    /// or accelerator from an incomplete prior run.
    pub cleanup_patterns: Vec<String>,
    /// Pause after cleanup so the kernel/driver can release the device.
    pub cleanup_settle_s: u64,
    pub crash_counter_path: PathBuf,
    /// Command line that launches the pipeline (argv form).
    pub pipeline_cmd: Vec<String>,
    /// Command line that reboots the host (argv form).
    pub reboot_cmd: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            max_crash_retries: 3,
            restart_delay_s: 5,
            cleanup_patterns: vec![],
            cleanup_settle_s: 3,
            crash_counter_path: PathBuf::from("/tmp/occupancy_edge_crash_count"),
            pipeline_cmd: vec!["occupancy-pipeline".to_string()],
            reboot_cmd: vec!["sudo".to_string(), "reboot".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Ingest endpoint for occupancy snapshots. Empty = emission disabled.
    pub ingest_url: String,
    pub api_key: String,
    pub lot_id: String,
    pub camera_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ingest_url: String::new(),
            api_key: String::new(),
            lot_id: "lot-1".to_string(),
            camera_id: "camera-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, gate) in [("gate1", &self.gates.gate1), ("gate2", &self.gates.gate2)] {
            if gate.line_a >= gate.line_b {
                bail!(
                    "{name}: line_a ({}) must be strictly below line_b ({})",
                    gate.line_a,
                    gate.line_b
                );
            }
            if gate.lateral_min >= gate.lateral_max {
                bail!(
                    "{name}: lateral_min ({}) must be below lateral_max ({})",
                    gate.lateral_min,
                    gate.lateral_max
                );
            }
            if gate.fallback_delta != 1 && gate.fallback_delta != -1 {
                bail!(
                    "{name}: fallback_delta must be +1 or -1, got {}",
                    gate.fallback_delta
                );
            }
            let band = gate.line_b - gate.line_a;
            if self.counting.hysteresis_margin >= band / 2.0 {
                bail!(
                    "hysteresis_margin ({}) must be below half the {name} band width ({band})",
                    self.counting.hysteresis_margin
                );
            }
        }
        if self.counting.hysteresis_margin < 0.0 {
            bail!("hysteresis_margin must be non-negative");
        }
        if self.counting.max_capacity == 0 {
            bail!("max_capacity must be positive");
        }
        if self.counting.seed_occupancy > self.counting.max_capacity {
            bail!(
                "seed_occupancy ({}) exceeds max_capacity ({})",
                self.counting.seed_occupancy,
                self.counting.max_capacity
            );
        }
        if self.counting.cooldown_s < 0.0 {
            bail!("cooldown_s must be non-negative");
        }
        if self.counting.bootstrap_duration_s < 0.0 || self.counting.bootstrap_offset_s < 0.0 {
            bail!("bootstrap duration and offset must be non-negative");
        }
        if self.filter.min_speed >= self.filter.max_speed {
            bail!(
                "min_speed ({}) must be below max_speed ({})",
                self.filter.min_speed,
                self.filter.max_speed
            );
        }
        if let Some(start) = &self.supervisor.start_time {
            chrono::NaiveTime::parse_from_str(start, "%H:%M")
                .with_context(|| format!("supervisor.start_time {start:?} is not HH:MM"))?;
        }
        if self.supervisor.pipeline_cmd.is_empty() {
            bail!("supervisor.pipeline_cmd must not be empty");
        }
        Ok(())
    }
}
