//! In-memory mock transports for testing
//!
//! These mocks record every call so tests can assert on exactly what was
//! sent, published, or subscribed and in which order, without a live mesh
//! or broker. They are published (not `#[cfg(test)]`) so downstream crates
//! can reuse them in their own tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;

use crate::time::Clock;
use crate::transport::{
    BrokerEvent, BrokerTransport, Destination, MeshEvent, MeshTransport, TransportError,
};

/// Mock mesh transport with scriptable events and recorded sends
#[derive(Debug, Default)]
pub struct MockMesh {
    /// Station address reported by `local_address()`
    pub address: String,
    /// Node id to name resolutions
    pub names: HashMap<u32, String>,
    /// JSON returned by `connection_tree_json()`
    pub tree_json: String,
    /// JSON returned by `name_map_json()`
    pub name_map_json: String,
    /// Every payload handed to `send()`
    pub sent: Vec<(Destination, Bytes)>,
    pending: VecDeque<MeshEvent>,
}

impl MockMesh {
    /// Create a mock mesh with no uplink and empty topology
    pub fn new() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            tree_json: "{}".to_string(),
            name_map_json: "{}".to_string(),
            ..Default::default()
        }
    }

    /// Queue an event for the next `poll_events()` call
    pub fn push_event(&mut self, event: MeshEvent) {
        self.pending.push_back(event);
    }

    /// Queue a received payload from the given node id
    pub fn push_received(&mut self, from: u32, data: impl Into<Bytes>) {
        self.pending.push_back(MeshEvent::Received {
            from,
            data: data.into(),
        });
    }
}

#[async_trait]
impl MeshTransport for MockMesh {
    async fn send(&mut self, dest: Destination, payload: Bytes) -> Result<(), TransportError> {
        self.sent.push((dest, payload));
        Ok(())
    }

    async fn poll_events(&mut self) -> Vec<MeshEvent> {
        self.pending.drain(..).collect()
    }

    async fn local_address(&self) -> String {
        self.address.clone()
    }

    async fn resolve_name(&self, node_id: u32) -> Option<String> {
        self.names.get(&node_id).cloned()
    }

    async fn connection_tree_json(&self) -> String {
        self.tree_json.clone()
    }

    async fn name_map_json(&self) -> String {
        self.name_map_json.clone()
    }
}

/// One recorded broker operation, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerOp {
    /// `connect(client_id)`
    Connect(String),
    /// `subscribe(channel)`
    Subscribe(String),
    /// `publish(channel)` (payload recorded separately)
    Publish(String),
}

/// Mock broker transport with a failable connect and a full operation log
#[derive(Debug, Default)]
pub struct MockBroker {
    /// When false, `connect()` fails with `ConnectFailed`
    pub connect_ok: bool,
    /// Every publish as `(channel, payload)`
    pub published: Vec<(String, Bytes)>,
    /// Every subscribed channel
    pub subscriptions: Vec<String>,
    /// All operations in call order, for sequence assertions
    pub ops: Vec<BrokerOp>,
    pending: VecDeque<BrokerEvent>,
}

impl MockBroker {
    /// Create a mock broker that accepts connects
    pub fn new() -> Self {
        Self {
            connect_ok: true,
            ..Default::default()
        }
    }

    /// Queue an incoming message on a channel
    pub fn push_message(&mut self, channel: impl Into<String>, data: impl Into<Bytes>) {
        self.pending.push_back(BrokerEvent::Message {
            channel: channel.into(),
            data: data.into(),
        });
    }

    /// Payloads published to one channel
    pub fn published_on(&self, channel: &str) -> Vec<&Bytes> {
        self.published
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, p)| p)
            .collect()
    }
}

#[async_trait]
impl BrokerTransport for MockBroker {
    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        self.ops.push(BrokerOp::Connect(client_id.to_string()));
        if self.connect_ok {
            Ok(())
        } else {
            Err(TransportError::ConnectFailed("mock refused".to_string()))
        }
    }

    async fn publish(&mut self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        self.ops.push(BrokerOp::Publish(channel.to_string()));
        self.published.push((channel.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), TransportError> {
        self.ops.push(BrokerOp::Subscribe(channel.to_string()));
        self.subscriptions.push(channel.to_string());
        Ok(())
    }

    async fn poll_events(&mut self) -> Vec<BrokerEvent> {
        self.pending.drain(..).collect()
    }
}

/// Clock returning a fixed timestamp
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl FixedClock {
    /// Fixed clock with an arbitrary but valid timestamp
    pub fn sample() -> Self {
        Self("2024-05-17 12:00:00".to_string())
    }
}

impl Clock for FixedClock {
    fn timestamp(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_mesh_records_sends() {
        let mut mesh = MockMesh::new();
        mesh.send(Destination::Node("bridge".into()), Bytes::from_static(b"hi"))
            .await
            .unwrap();
        assert_eq!(mesh.sent.len(), 1);
        assert_eq!(mesh.sent[0].0, Destination::Node("bridge".into()));
    }

    #[tokio::test]
    async fn test_mock_mesh_drains_events_once() {
        let mut mesh = MockMesh::new();
        mesh.push_received(7, &b"data"[..]);
        assert_eq!(mesh.poll_events().await.len(), 1);
        assert!(mesh.poll_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_broker_failable_connect() {
        let mut broker = MockBroker::new();
        broker.connect_ok = false;
        assert!(broker.connect("client").await.is_err());
        broker.connect_ok = true;
        assert!(broker.connect("client").await.is_ok());
        assert_eq!(broker.ops.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_broker_op_order() {
        let mut broker = MockBroker::new();
        broker.subscribe("a").await.unwrap();
        broker.publish("b", Bytes::new()).await.unwrap();
        assert_eq!(
            broker.ops,
            vec![BrokerOp::Subscribe("a".into()), BrokerOp::Publish("b".into())]
        );
    }
}
