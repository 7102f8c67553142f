// src/counter.rs
//
// The saturating occupancy counter, single writer on the frame path.
// Clamping at 0 absorbs a spurious exit when the lot is already empty
// and clamping at capacity absorbs an over-count; neither is an error.
// Every actual change is synchronously checkpointed; a failed write is
// logged and the in-memory value stays authoritative — the next change
// simply tries again.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::types::{OccupancyChange, TrackId};
use chrono::Utc;
use tracing::{info, warn};

pub struct OccupancyCounter {
    count: u32,
    max_capacity: u32,
    store: CheckpointStore,
}

impl OccupancyCounter {
    /// `seed` is the supervisor's warm/cold decision, applied once here;
    /// it bypasses delta logic but is still clamped to capacity.
    pub fn new(seed: u32, max_capacity: u32, store: CheckpointStore) -> Self {
        Self {
            count: seed.min(max_capacity),
            max_capacity,
            store,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    /// Apply a signed delta. Returns the change when the clamped value
    /// actually moved, after persisting it.
    pub fn apply_delta(&mut self, delta: i32, track_id: TrackId) -> Option<OccupancyChange> {
        let before = self.count;
        let after = (i64::from(before) + i64::from(delta))
            .clamp(0, i64::from(self.max_capacity)) as u32;
        if after == before {
            return None;
        }

        self.count = after;
        let timestamp = Utc::now();
        let change = OccupancyChange {
            timestamp,
            delta,
            track_id,
            occupancy_before: before,
            occupancy_after: after,
        };

        if let Err(error) = self.store.write(&Checkpoint {
            occupancy: after,
            timestamp,
        }) {
            // In-memory count stays authoritative; the next change
            // rewrites the full state anyway.
            warn!(%error, "checkpoint write failed");
        }

        info!(
            delta,
            track_id,
            occupancy = after,
            capacity = self.max_capacity,
            "occupancy changed"
        );
        Some(change)
    }
}
