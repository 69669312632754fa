//! Coop Bridge - routes mesh traffic to an external message broker
//!
//! One node in the mesh is the bridge: it owns the only uplink, watches its
//! own reachability, and republishes everything of interest to the broker:
//!
//! - **Measurements** from sensor nodes, enriched with sender id, resolved
//!   sender name, and a receive timestamp
//! - **Topology snapshots** (connection tree + name map) whenever the mesh
//!   shape changes or a consumer asks for one
//! - **Connection acks** answering dashboard hello messages
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     BridgeDispatcher                       │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  ┌──────────────┐   ┌───────────────┐   ┌──────────────┐   │
//! │  │ MeshTransport│◄─►│ dispatch core │◄─►│BrokerTranspo-│   │
//! │  │ (external)   │   │               │   │rt (external) │   │
//! │  └──────────────┘   │ cudp decode   │   └──────────────┘   │
//! │                     │ classify      │   ┌──────────────┐   │
//! │                     │ topology      │◄──│ BridgeHandle │   │
//! │                     └───────────────┘   └──────────────┘   │
//! │                                                            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatcher runs a single cooperative loop; each iteration services
//! mesh events (connectivity changes before received payloads), then broker
//! events, then the address poll. Nothing in here is fatal: bad packets are
//! dropped, failed publishes are logged, failed connects are retried on the
//! next poll.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod topology;

// Re-exports for convenience
pub use config::{
    BridgeConfig, BridgeConfigBuilder, BrokerSettings, ChannelNames, MeshSettings,
    StationSettings,
};
pub use dispatcher::{BridgeCommand, BridgeDispatcher, BridgeHandle, BridgeStats};
pub use error::{BridgeError, Result};
pub use topology::{AggregationError, TopologySnapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
