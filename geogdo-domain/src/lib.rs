//! Core engine: turns vehicle telemetry into door operations.
//!
//! Data flows in one direction. The ingest layer demultiplexes raw feed
//! messages into per-vehicle updates; the evaluator merges each update into
//! the vehicle's state and detects geofence boundary crossings; the
//! coordinator serializes the resulting operations per door.

pub mod coordinator;
pub mod evaluator;
pub mod fleet;
pub mod ingest;

pub use coordinator::trigger;
pub use fleet::{Door, Vehicle};
