//! Transport contracts for the mesh and broker collaborators
//!
//! The mesh transport delivers small payloads across a self-organizing
//! multi-hop network and maintains a naming layer over numeric node ids.
//! The broker transport is a channel-addressed publish/subscribe link to
//! the outside world. Both are consumed through the traits in this module;
//! real implementations live outside this workspace, mocks live in
//! [`crate::test_utils`].
//!
//! Event delivery is pull-based: instead of registering callbacks, callers
//! drain pending events with `poll_events()` once per run-loop iteration.
//! This keeps the run loop single-threaded and makes components testable
//! without a live transport.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Where a mesh payload should be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Unicast to the node carrying this assigned name
    Node(String),
    /// Flood to every reachable node
    Broadcast,
}

/// Events surfaced by the mesh transport
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// A payload arrived from another node
    Received {
        /// Numeric node id assigned by the transport (stable per session)
        from: u32,
        /// Raw payload bytes as delivered
        data: Bytes,
    },
    /// The connection tree changed (node joined, left, or re-parented)
    ConnectivityChanged,
}

/// Events surfaced by the broker transport
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A message arrived on a subscribed channel
    Message {
        /// Channel the message was published on
        channel: String,
        /// Raw message bytes
        data: Bytes,
    },
}

/// Errors reported by transport implementations
#[derive(Error, Debug)]
pub enum TransportError {
    /// Mesh send failed
    #[error("mesh send failed: {0}")]
    SendFailed(String),

    /// Broker connect attempt was refused or timed out
    #[error("broker connect failed: {0}")]
    ConnectFailed(String),

    /// Broker publish failed
    #[error("broker publish failed: {0}")]
    PublishFailed(String),

    /// Broker subscribe failed
    #[error("broker subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Operation requires a connected broker link
    #[error("broker not connected")]
    NotConnected,

    /// Underlying channel to the transport task is gone
    #[error("transport channel closed")]
    ChannelClosed,
}

impl TransportError {
    /// Check if this error is recoverable by retrying later
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectFailed(_)
                | TransportError::PublishFailed(_)
                | TransportError::NotConnected
        )
    }
}

/// Multi-hop mesh transport contract
///
/// Mirrors the observable surface of the external mesh layer: delivery,
/// pending-event drain, the station address, and the naming/topology
/// introspection the bridge republishes.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Send a payload to a single node or to the whole mesh
    async fn send(&mut self, dest: Destination, payload: Bytes) -> Result<(), TransportError>;

    /// Drain events that arrived since the last poll
    ///
    /// Returns events in arrival order; an empty vec means nothing is
    /// pending. Never blocks waiting for new events.
    async fn poll_events(&mut self) -> Vec<MeshEvent>;

    /// Current station (uplink) address, `0.0.0.0` when there is none
    async fn local_address(&self) -> String;

    /// Resolve a numeric node id to its assigned name, if known
    async fn resolve_name(&self, node_id: u32) -> Option<String>;

    /// Connection tree rooted at this node, as a JSON document
    async fn connection_tree_json(&self) -> String;

    /// Node id to assigned name map, as a JSON document
    async fn name_map_json(&self) -> String;
}

/// Channel-addressed publish/subscribe broker contract
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Attempt to (re)connect with the given client id
    ///
    /// Must be bounded: a stalled connect would starve the run loop.
    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError>;

    /// Publish a payload to a channel
    async fn publish(&mut self, channel: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribe to a channel (wildcard subtrees allowed by the broker)
    async fn subscribe(&mut self, channel: &str) -> Result<(), TransportError>;

    /// Drain messages received on subscribed channels since the last poll
    async fn poll_events(&mut self) -> Vec<BrokerEvent>;
}

/// Reachability of the broker link as tracked by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No route to the broker, no attempt in progress
    Disconnected,
    /// Route available, connect attempted but not yet successful
    Connecting,
    /// Last connect attempt succeeded
    Connected,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
        }
    }
}
