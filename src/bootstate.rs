// src/bootstate.rs
//
// Boot-scoped durable counters. The watchdog freeze count and the
// supervisor crash count must survive process restarts within one boot
// but never a reboot, so they live in small files (on tmpfs in the
// default config) with an explicit reset hook the supervisor calls at
// boot start.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct BootScopedCounter {
    path: PathBuf,
}

impl BootScopedCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable file counts as zero, matching a fresh boot.
    pub fn read(&self) -> u64 {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Returns the value after incrementing.
    pub fn increment(&self) -> Result<u64> {
        let next = self.read() + 1;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        fs::write(&self.path, next.to_string())
            .with_context(|| format!("writing counter {}", self.path.display()))?;
        Ok(next)
    }

    /// The "clear at boot" hook, also used when a non-crash exit resets
    /// the crash ladder.
    pub fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("removing counter {}", self.path.display()))
            }
        }
    }
}
