// src/tracks.rs
//
// Track arena keyed by tracker-assigned id. Holds just enough history to
// derive instantaneous speed along the crossing axis and the track's age
// in frames. Tracks silent for longer than the configured timeout are
// evicted so memory stays bounded regardless of tracker churn; the engine
// forwards evictions to the gates and the sequencer.

use crate::types::TrackId;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TrackRecord {
    pub first_seen: f64,
    pub last_seen: f64,
    pub age_frames: u32,
    pub y_prev: Option<f32>,
    pub t_prev: f64,
    /// px/s along the crossing axis, + toward increasing y. Zero until
    /// the second sighting.
    pub speed: f32,
}

/// Snapshot of one track's position handed to the filter and the gates.
#[derive(Debug, Clone, Copy)]
pub struct PositionSample {
    pub track_id: TrackId,
    /// Lateral (x) coordinate of the box center.
    pub cx: f32,
    /// Reference point along the crossing axis.
    pub y: f32,
    /// Previous frame's reference point, if any.
    pub y_prev: Option<f32>,
    pub timestamp: f64,
    pub speed: f32,
    pub age_frames: u32,
}

pub struct TrackStore {
    tracks: HashMap<TrackId, TrackRecord>,
    silence_timeout_s: f64,
}

impl TrackStore {
    pub fn new(silence_timeout_s: f64) -> Self {
        Self {
            tracks: HashMap::new(),
            silence_timeout_s,
        }
    }

    /// Record a sighting and return the updated position sample.
    pub fn observe(&mut self, track_id: TrackId, cx: f32, y: f32, timestamp: f64) -> PositionSample {
        let record = self.tracks.entry(track_id).or_insert_with(|| TrackRecord {
            first_seen: timestamp,
            last_seen: timestamp,
            age_frames: 0,
            y_prev: None,
            t_prev: timestamp,
            speed: 0.0,
        });

        let y_prev = record.y_prev;
        if let Some(prev) = y_prev {
            let dt = (timestamp - record.t_prev).max(1e-3);
            record.speed = ((y - prev) as f64 / dt) as f32;
        }

        record.age_frames = record.age_frames.saturating_add(1);
        record.last_seen = timestamp;

        let sample = PositionSample {
            track_id,
            cx,
            y,
            y_prev,
            timestamp,
            speed: record.speed,
            age_frames: record.age_frames,
        };

        record.y_prev = Some(y);
        record.t_prev = timestamp;

        sample
    }

    /// Drop tracks not sighted since `now - silence_timeout` and return
    /// their ids so per-gate and sequencer state can be released too.
    pub fn evict_stale(&mut self, now: f64) -> Vec<TrackId> {
        let timeout = self.silence_timeout_s;
        let stale: Vec<TrackId> = self
            .tracks
            .iter()
            .filter(|(_, record)| now - record.last_seen > timeout)
            .map(|(&id, _)| id)
            .collect();
        for id in &stale {
            self.tracks.remove(id);
            debug!(track_id = id, "track evicted after silence timeout");
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_has_no_speed() {
        let mut store = TrackStore::new(5.0);
        let sample = store.observe(1, 100.0, 50.0, 10.0);
        assert_eq!(sample.age_frames, 1);
        assert_eq!(sample.y_prev, None);
        assert_eq!(sample.speed, 0.0);
    }

    #[test]
    fn speed_derived_from_consecutive_sightings() {
        let mut store = TrackStore::new(5.0);
        store.observe(1, 100.0, 50.0, 10.0);
        let sample = store.observe(1, 100.0, 60.0, 10.5);
        // 10px over 0.5s = 20px/s downward
        assert!((sample.speed - 20.0).abs() < 1e-3);
        assert_eq!(sample.y_prev, Some(50.0));
        assert_eq!(sample.age_frames, 2);

        let up = store.observe(1, 100.0, 55.0, 11.0);
        assert!(up.speed < 0.0);
    }

    #[test]
    fn silent_tracks_are_evicted() {
        let mut store = TrackStore::new(5.0);
        store.observe(1, 100.0, 50.0, 10.0);
        store.observe(2, 200.0, 60.0, 14.0);

        let evicted = store.evict_stale(16.0);
        assert_eq!(evicted, vec![1]);
        assert_eq!(store.len(), 1);

        // Track 2 survives and keeps its history
        let sample = store.observe(2, 200.0, 70.0, 16.5);
        assert_eq!(sample.y_prev, Some(60.0));
    }
}
