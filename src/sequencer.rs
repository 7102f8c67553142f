// src/sequencer.rs
//
// Turns per-gate crossing events into signed occupancy deltas.
//
// Canonical case: a track fires gate 1 then gate 2 (or the reverse).
// Gate order encodes direction — the gates sit in sequence along the
// lane, so G1-before-G2 is a vehicle entering (+1) and G2-before-G1 one
// exiting (-1).
//
// Single-gate fallback: with partial detector coverage a track is often
// lost after firing only one gate. When enabled, eviction of such a
// track emits the owning gate's configured fallback delta instead of
// dropping the crossing.
//
// Debounce: after an accepted decision, further events from the same
// track inside the cooldown window are discarded, so a vehicle idling
// across a line cannot double-count one physical pass.

use crate::config::{CountingConfig, GatesConfig};
use crate::types::{CrossingDirection, GateCrossingEvent, GateId, TrackId};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct PendingCrossing {
    gate: GateId,
    #[allow(dead_code)]
    direction: CrossingDirection,
    timestamp: f64,
}

/// One accepted counting decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub track_id: TrackId,
    pub delta: i32,
}

pub struct Sequencer {
    cooldown_s: f64,
    single_gate_fallback: bool,
    /// Indexed by GateId::index().
    fallback_delta: [i32; 2],
    pending: HashMap<TrackId, PendingCrossing>,
    last_decision_at: HashMap<TrackId, f64>,
}

impl Sequencer {
    pub fn new(counting: &CountingConfig, gates: &GatesConfig) -> Self {
        Self {
            cooldown_s: counting.cooldown_s,
            single_gate_fallback: counting.single_gate_fallback,
            fallback_delta: [gates.gate1.fallback_delta, gates.gate2.fallback_delta],
            pending: HashMap::new(),
            last_decision_at: HashMap::new(),
        }
    }

    fn in_cooldown(&self, track_id: TrackId, now: f64) -> bool {
        self.last_decision_at
            .get(&track_id)
            .is_some_and(|&at| now - at < self.cooldown_s)
    }

    /// Feed one crossing event. Returns a decision when this event
    /// completes a two-gate sequence.
    pub fn ingest(&mut self, event: GateCrossingEvent) -> Option<Decision> {
        if self.in_cooldown(event.track_id, event.timestamp) {
            debug!(
                track_id = event.track_id,
                gate = event.gate.as_str(),
                "crossing discarded inside cooldown window"
            );
            return None;
        }

        match self.pending.get(&event.track_id) {
            Some(pending) if pending.gate != event.gate => {
                let delta = match pending.gate {
                    GateId::Gate1 => 1,
                    GateId::Gate2 => -1,
                };
                self.pending.remove(&event.track_id);
                self.last_decision_at.insert(event.track_id, event.timestamp);
                Some(Decision {
                    track_id: event.track_id,
                    delta,
                })
            }
            _ => {
                // No pending crossing, or a repeat on the same gate:
                // the latest crossing wins.
                self.pending.insert(
                    event.track_id,
                    PendingCrossing {
                        gate: event.gate,
                        direction: event.direction,
                        timestamp: event.timestamp,
                    },
                );
                None
            }
        }
    }

    /// Called when a track is evicted. With the fallback enabled, an
    /// unconsumed pending crossing resolves to the owning gate's default
    /// delta; otherwise it is dropped.
    pub fn flush_evicted(&mut self, track_id: TrackId) -> Option<Decision> {
        self.last_decision_at.remove(&track_id);
        let pending = self.pending.remove(&track_id)?;

        if !self.single_gate_fallback {
            debug!(
                track_id,
                gate = pending.gate.as_str(),
                "dropping unpaired crossing (fallback disabled)"
            );
            return None;
        }

        let delta = self.fallback_delta[pending.gate.index()];
        debug!(
            track_id,
            gate = pending.gate.as_str(),
            delta, "single-gate fallback decision for lost track"
        );
        Some(Decision { track_id, delta })
    }

    /// Drop all state for a track without emitting anything. Used during
    /// the bootstrap window.
    pub fn forget(&mut self, track_id: TrackId) {
        self.pending.remove(&track_id);
        self.last_decision_at.remove(&track_id);
    }
}
