// src/checkpoint.rs
//
// Durable occupancy snapshot: {occupancy, timestamp} as JSON, rewritten
// on every accepted change and read once at process start. Writes go
// through a temp file + rename so a crash mid-write never leaves a
// truncated checkpoint behind.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Checkpoint {
    pub occupancy: u32,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh enough for a warm restart?
    pub fn is_fresh(&self, ttl_s: u64, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.timestamp);
        age >= chrono::Duration::zero() && age.num_seconds() as u64 <= ttl_s
    }
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// None when no checkpoint has ever been written.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading checkpoint {}", self.path.display()))?;
        let checkpoint: Checkpoint = serde_json::from_str(&contents)
            .with_context(|| format!("parsing checkpoint {}", self.path.display()))?;
        Ok(Some(checkpoint))
    }

    pub fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string(checkpoint)?;
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn missing_checkpoint_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("last.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state/last.json"));
        let checkpoint = Checkpoint {
            occupancy: 17,
            timestamp: Utc::now(),
        };
        store.write(&checkpoint).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.occupancy, 17);
        assert_eq!(loaded.timestamp, checkpoint.timestamp);
    }

    #[test]
    fn corrupt_checkpoint_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last.json");
        fs::write(&path, "{not json").unwrap();
        let store = CheckpointStore::new(path);
        assert!(store.load().is_err());
    }

    #[test]
    fn freshness_respects_ttl() {
        let now = Utc::now();
        let fresh = Checkpoint {
            occupancy: 5,
            timestamp: now - Duration::seconds(600),
        };
        assert!(fresh.is_fresh(900, now));

        let stale = Checkpoint {
            occupancy: 5,
            timestamp: now - Duration::seconds(1200),
        };
        assert!(!stale.is_fresh(900, now));
    }

    #[test]
    fn future_timestamp_is_not_fresh() {
        let now = Utc::now();
        let skewed = Checkpoint {
            occupancy: 5,
            timestamp: now + Duration::seconds(120),
        };
        assert!(!skewed.is_fresh(900, now));
    }
}
