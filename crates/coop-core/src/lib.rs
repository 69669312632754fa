//! Coop Core - Shared abstractions for the coop mesh network
//!
//! This crate provides the traits and types the rest of the workspace is
//! built against:
//!
//! - [`transport`] - Mesh and broker transport traits plus their event types
//! - [`time`] - Wall-clock abstraction used for message enrichment
//! - [`test_utils`] - In-memory mock transports for testing without hardware
//!
//! The actual multi-hop mesh delivery and the broker connection are supplied
//! externally; everything here only describes their observable contracts so
//! the bridge and sensor logic can be exercised against mocks.

pub mod time;
pub mod transport;

pub mod test_utils;

// Re-exports for convenience
pub use time::{Clock, SystemClock};
pub use transport::{
    BrokerEvent, BrokerTransport, Destination, LinkState, MeshEvent, MeshTransport,
    TransportError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
