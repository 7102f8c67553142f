// src/engine.rs
//
// Per-frame wiring: detections -> filter -> gate monitors -> sequencer
// -> counter. Also owns the bootstrap window: until it elapses the gates
// and tracks learn state normally but no deltas are emitted, so an
// object already past a gate at startup cannot produce a false crossing.

use crate::backend::OccupancyReporter;
use crate::config::Config;
use crate::counter::OccupancyCounter;
use crate::filter::TrackFilter;
use crate::gate::GateMonitor;
use crate::sequencer::Sequencer;
use crate::tracks::TrackStore;
use crate::types::{FrameBatch, GateId, OccupancyChange};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct CountingEngine {
    filter: TrackFilter,
    tracks: TrackStore,
    gates: [GateMonitor; 2],
    sequencer: Sequencer,
    counter: OccupancyCounter,
    reporter: Option<OccupancyReporter>,
    /// Counting is suppressed before this instant.
    active_at: Instant,
}

impl CountingEngine {
    pub fn new(
        config: &Config,
        counter: OccupancyCounter,
        reporter: Option<OccupancyReporter>,
        bootstrap: Duration,
    ) -> Self {
        let hysteresis = config.counting.hysteresis_margin;
        let active_at = Instant::now()
            + Duration::from_secs_f64(config.counting.bootstrap_offset_s)
            + bootstrap;
        if !bootstrap.is_zero() {
            info!(
                bootstrap_s = bootstrap.as_secs_f64(),
                offset_s = config.counting.bootstrap_offset_s,
                "bootstrap window active, learning zones silently"
            );
        }
        Self {
            filter: TrackFilter::new(config.filter.clone()),
            tracks: TrackStore::new(config.counting.silence_timeout_s),
            gates: [
                GateMonitor::new(GateId::Gate1, &config.gates.gate1, hysteresis),
                GateMonitor::new(GateId::Gate2, &config.gates.gate2, hysteresis),
            ],
            sequencer: Sequencer::new(&config.counting, &config.gates),
            counter,
            reporter,
            active_at,
        }
    }

    pub fn occupancy(&self) -> u32 {
        self.counter.count()
    }

    fn counting_active(&self) -> bool {
        Instant::now() >= self.active_at
    }

    /// Process one frame batch; returns the accepted occupancy changes.
    pub fn process_frame(&mut self, batch: &FrameBatch) -> Vec<OccupancyChange> {
        let counting = self.counting_active();
        let mut changes = Vec::new();

        for detection in &batch.detections {
            if detection.track_id < 0 {
                continue;
            }
            let ref_y = self.filter.ref_y(detection);
            let sample = self.tracks.observe(
                detection.track_id,
                detection.bbox.center_x(),
                ref_y,
                batch.timestamp,
            );

            if let Err(reason) = self.filter.evaluate(detection, &sample) {
                debug!(
                    track_id = detection.track_id,
                    reason = reason.as_str(),
                    "detection rejected"
                );
                continue;
            }

            for gate in &mut self.gates {
                let Some(event) = gate.observe(&sample) else {
                    continue;
                };
                if !counting {
                    debug!(
                        track_id = event.track_id,
                        gate = event.gate.as_str(),
                        "crossing ignored during bootstrap"
                    );
                    continue;
                }
                if let Some(decision) = self.sequencer.ingest(event) {
                    if let Some(change) = self.counter.apply_delta(decision.delta, decision.track_id)
                    {
                        changes.push(change);
                    }
                }
            }
        }

        // Evictions resolve single-gate fallbacks and release per-gate
        // and sequencer state.
        for track_id in self.tracks.evict_stale(batch.timestamp) {
            for gate in &mut self.gates {
                gate.forget(track_id);
            }
            if counting {
                if let Some(decision) = self.sequencer.flush_evicted(track_id) {
                    if let Some(change) = self.counter.apply_delta(decision.delta, decision.track_id)
                    {
                        changes.push(change);
                    }
                }
            } else {
                self.sequencer.forget(track_id);
            }
        }

        if let Some(reporter) = &self.reporter {
            for change in &changes {
                reporter.report(change);
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointStore;
    use crate::types::{BoundingBox, Detection};

    fn test_config() -> Config {
        let mut config = Config::default();
        // The reference geometry from the two-gate deployment
        config.gates.gate1.line_a = 26.0;
        config.gates.gate1.line_b = 62.0;
        config.gates.gate1.lateral_min = 311.0;
        config.gates.gate1.lateral_max = 379.0;
        config.gates.gate2.line_a = 26.0;
        config.gates.gate2.line_b = 62.0;
        config.gates.gate2.lateral_min = 500.0;
        config.gates.gate2.lateral_max = 600.0;
        config.counting.hysteresis_margin = 0.0;
        config.counting.cooldown_s = 5.0;
        config.counting.silence_timeout_s = 5.0;
        config.filter.min_track_age = 2;
        config.filter.ref_point = crate::types::RefPoint::Center;
        config.validate().unwrap();
        config
    }

    fn engine_with(config: &Config, seed: u32, bootstrap: Duration) -> (CountingEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("last.json"));
        let counter = OccupancyCounter::new(seed, config.counting.max_capacity, store);
        (CountingEngine::new(config, counter, None, bootstrap), dir)
    }

    fn detection(track_id: i64, cx: f32, cy: f32) -> Detection {
        Detection {
            track_id,
            bbox: BoundingBox {
                x1: cx - 20.0,
                y1: cy - 15.0,
                x2: cx + 20.0,
                y2: cy + 15.0,
            },
            confidence: Some(0.9),
        }
    }

    fn frame(t: f64, detections: Vec<Detection>) -> FrameBatch {
        FrameBatch {
            timestamp: t,
            detections,
        }
    }

    /// Drive one track through a gate's lateral window from above line A
    /// to below line B, then through the second gate the same way.
    #[test]
    fn full_two_gate_pass_counts_one_entry() {
        let config = test_config();
        let (mut engine, _dir) = engine_with(&config, 0, Duration::ZERO);

        let path = [10.0_f32, 20.0, 35.0, 50.0, 70.0, 80.0];
        let mut t = 0.0;
        for &y in &path {
            engine.process_frame(&frame(t, vec![detection(1, 340.0, y)]));
            t += 0.2;
        }
        assert_eq!(engine.occupancy(), 0); // only gate 1 fired so far

        for &y in &path {
            engine.process_frame(&frame(t, vec![detection(1, 550.0, y)]));
            t += 0.2;
        }
        assert_eq!(engine.occupancy(), 1);
    }

    #[test]
    fn reverse_order_counts_one_exit() {
        let config = test_config();
        let (mut engine, _dir) = engine_with(&config, 3, Duration::ZERO);

        let path = [10.0_f32, 20.0, 35.0, 50.0, 70.0, 80.0];
        let mut t = 0.0;
        for &y in &path {
            engine.process_frame(&frame(t, vec![detection(1, 550.0, y)]));
            t += 0.2;
        }
        for &y in &path {
            engine.process_frame(&frame(t, vec![detection(1, 340.0, y)]));
            t += 0.2;
        }
        assert_eq!(engine.occupancy(), 2);
    }

    #[test]
    fn undersized_boxes_never_count() {
        let config = test_config();
        let (mut engine, _dir) = engine_with(&config, 0, Duration::ZERO);

        let path = [10.0_f32, 20.0, 35.0, 50.0, 70.0, 80.0];
        let mut t = 0.0;
        for lateral in [340.0, 550.0] {
            for &y in &path {
                let mut det = detection(1, lateral, y);
                det.bbox.x2 = det.bbox.x1 + 6.0; // 6px wide, below min_box_w
                det.bbox.y2 = det.bbox.y1 + 6.0;
                engine.process_frame(&frame(t, vec![det]));
                t += 0.2;
            }
        }
        assert_eq!(engine.occupancy(), 0);
    }

    #[test]
    fn bootstrap_window_suppresses_counting() {
        let config = test_config();
        let (mut engine, _dir) = engine_with(&config, 0, Duration::from_secs(3600));

        let path = [10.0_f32, 20.0, 35.0, 50.0, 70.0, 80.0];
        let mut t = 0.0;
        for lateral in [340.0, 550.0] {
            for &y in &path {
                engine.process_frame(&frame(t, vec![detection(1, lateral, y)]));
                t += 0.2;
            }
        }
        assert_eq!(engine.occupancy(), 0);
    }

    #[test]
    fn lost_track_with_fallback_counts_at_eviction() {
        let mut config = test_config();
        config.counting.single_gate_fallback = true;
        let (mut engine, _dir) = engine_with(&config, 0, Duration::ZERO);

        let path = [10.0_f32, 20.0, 35.0, 50.0, 70.0, 80.0];
        let mut t = 0.0;
        for &y in &path {
            engine.process_frame(&frame(t, vec![detection(1, 340.0, y)]));
            t += 0.2;
        }
        assert_eq!(engine.occupancy(), 0);

        // Track 1 disappears; a later frame past the silence timeout
        // triggers eviction and the gate-1 fallback (+1).
        engine.process_frame(&frame(t + 10.0, vec![]));
        assert_eq!(engine.occupancy(), 1);
    }

    #[test]
    fn lost_track_without_fallback_is_dropped() {
        let config = test_config();
        let (mut engine, _dir) = engine_with(&config, 0, Duration::ZERO);

        let path = [10.0_f32, 20.0, 35.0, 50.0, 70.0, 80.0];
        let mut t = 0.0;
        for &y in &path {
            engine.process_frame(&frame(t, vec![detection(1, 340.0, y)]));
            t += 0.2;
        }
        engine.process_frame(&frame(t + 10.0, vec![]));
        assert_eq!(engine.occupancy(), 0);
    }
}
