//! Coop Sensor - the measuring peer of the bridge
//!
//! A sensor node runs two independent periodic tasks: a fast sampling tick
//! that reads the attached sensors into a running-sum accumulator, and a
//! slower send tick that averages the accumulated samples, packs them into
//! a CUDP `Measurements` packet, and unicasts it to the bridge's logical
//! name over the mesh.
//!
//! The accumulator is only ever touched from the node's own run loop, so
//! the two ticks cannot interleave; the send tick reads and resets it in
//! one step. A send tick with zero accumulated samples sends nothing.

pub mod accumulator;
pub mod config;
pub mod node;
pub mod source;

// Re-exports for convenience
pub use accumulator::Accumulator;
pub use config::{SensorConfig, SensorConfigBuilder};
pub use node::{SensorCommand, SensorHandle, SensorNode, SensorStats};
pub use source::{FixedSource, SensorReading, SensorSource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
