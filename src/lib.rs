// src/lib.rs
//
// Gate-crossing occupancy counting for an unattended edge device.
//
// Three cooperating layers share this crate:
//   - the counting engine (filter -> gates -> sequencer -> counter),
//     driven by the `occupancy-pipeline` binary from a JSONL detection
//     stream on stdin;
//   - the liveness watchdog, an independent observer of the frame
//     heartbeat;
//   - the supervisor policy behind `occupancy-supervisor`, which owns
//     the restart/reboot escalation ladder via the exit-status protocol
//     in `protocol`.

pub mod backend;
pub mod bootstate;
pub mod checkpoint;
pub mod config;
pub mod counter;
pub mod engine;
pub mod filter;
pub mod gate;
pub mod protocol;
pub mod sequencer;
pub mod supervisor;
pub mod tracks;
pub mod types;
pub mod watchdog;
