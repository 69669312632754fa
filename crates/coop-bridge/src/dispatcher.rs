//! BridgeDispatcher - the bridge's message-routing state machine
//!
//! Owns the broker reachability state and reacts to three event sources:
//!
//! - Mesh receive events: CUDP decode, classify, enrich, republish
//! - Mesh connectivity changes: rebuild and republish the topology snapshot
//! - Broker control messages: connection checks and topology requests
//!
//! Reachability is poll-driven, not event-driven: the station address is
//! not otherwise observable, so every loop iteration compares it against
//! the last known one. An address change moves the link to `Connecting`;
//! the connect attempt is retried on every subsequent poll until it
//! succeeds, with no backoff (acceptable for a small fixed mesh).
//!
//! On a successful connect the bridge, in order: subscribes to the
//! dashboard control subtree, announces itself on the ack channel, and
//! publishes a fresh topology snapshot.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use coop_core::time::Clock;
use coop_core::transport::{
    BrokerEvent, BrokerTransport, LinkState, MeshEvent, MeshTransport,
};
use coop_protocol::classify::{classify, ClassifyError};
use coop_protocol::cudp;
use coop_protocol::message::{JsonMap, MeshMessage, MsgType};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::topology::TopologySnapshot;

/// Commands that can be sent to a running dispatcher
#[derive(Debug)]
pub enum BridgeCommand {
    /// Get dispatcher statistics
    GetStats(oneshot::Sender<BridgeStats>),
    /// Get current broker link state
    GetLinkState(oneshot::Sender<LinkState>),
    /// Shut the dispatcher down
    Shutdown,
}

/// Handle for controlling a running [`BridgeDispatcher`]
#[derive(Clone)]
pub struct BridgeHandle {
    command_tx: mpsc::Sender<BridgeCommand>,
}

impl BridgeHandle {
    /// Get dispatcher statistics
    pub async fn stats(&self) -> Result<BridgeStats> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(BridgeCommand::GetStats(tx))
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// Get the current broker link state
    pub async fn link_state(&self) -> Result<LinkState> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(BridgeCommand::GetLinkState(tx))
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    /// Shut the dispatcher down
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(BridgeCommand::Shutdown)
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }
}

/// Dispatcher statistics
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    /// Enriched measurements published
    pub measurements_published: u64,
    /// Topology snapshots published
    pub topology_published: u64,
    /// Connection acks published
    pub acks_published: u64,
    /// Packets dropped at decode (checksum, framing, bad JSON)
    pub decode_failures: u64,
    /// Payloads dropped at classification (unknown or malformed type)
    pub classify_drops: u64,
    /// Topology publishes skipped because a fragment would not parse
    pub aggregation_failures: u64,
    /// Broker connect attempts
    pub connect_attempts: u64,
    /// Broker connect attempts that failed
    pub connect_failures: u64,
    /// Publishes that the broker transport rejected
    pub publish_failures: u64,
}

/// The bridge's routing core, generic over its external collaborators
pub struct BridgeDispatcher<M, B, C> {
    config: BridgeConfig,
    mesh: M,
    broker: B,
    clock: C,
    /// Last observed station address; `0.0.0.0` means no uplink yet
    current_address: String,
    link_state: LinkState,
    stats: BridgeStats,
    command_rx: mpsc::Receiver<BridgeCommand>,
    running: bool,
}

impl<M, B, C> BridgeDispatcher<M, B, C>
where
    M: MeshTransport,
    B: BrokerTransport,
    C: Clock,
{
    /// Create a dispatcher and its control handle
    pub fn new(config: BridgeConfig, mesh: M, broker: B, clock: C) -> (Self, BridgeHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let handle = BridgeHandle { command_tx };

        let dispatcher = Self {
            config,
            mesh,
            broker,
            clock,
            current_address: "0.0.0.0".to_string(),
            link_state: LinkState::Disconnected,
            stats: BridgeStats::default(),
            command_rx,
            running: false,
        };

        (dispatcher, handle)
    }

    /// Current broker link state
    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    /// Dispatcher statistics so far
    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// The mesh transport (for inspection in tests and the simulator)
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// The broker transport (for inspection in tests and the simulator)
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Run the dispatcher's cooperative loop until shut down
    ///
    /// Each iteration services pending mesh events, then pending broker
    /// events, then the address poll. No iteration blocks on a transport;
    /// a stalled broker connect would otherwise starve mesh handling.
    pub async fn run(mut self) -> Result<()> {
        info!(
            bridge = %self.config.bridge_name,
            mesh = %self.config.mesh.name,
            "starting bridge dispatcher"
        );
        let mut poll = tokio::time::interval(self.config.poll_interval);
        self.running = true;

        while self.running {
            tokio::select! {
                _ = poll.tick() => {
                    self.service_transports().await;
                }
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        BridgeCommand::GetStats(tx) => {
                            let _ = tx.send(self.stats.clone());
                        }
                        BridgeCommand::GetLinkState(tx) => {
                            let _ = tx.send(self.link_state);
                        }
                        BridgeCommand::Shutdown => {
                            info!("bridge shutdown requested");
                            self.running = false;
                        }
                    }
                }
            }
        }

        info!("bridge dispatcher stopped");
        Ok(())
    }

    /// One run-loop iteration's worth of transport servicing
    ///
    /// Connectivity-changed events are handled before that iteration's
    /// received payloads so reachability is current before any publish.
    pub async fn service_transports(&mut self) {
        let events = self.mesh.poll_events().await;

        for event in &events {
            if matches!(event, MeshEvent::ConnectivityChanged) {
                self.on_connectivity_changed().await;
            }
        }
        for event in events {
            if let MeshEvent::Received { from, data } = event {
                self.on_mesh_receive(from, &data).await;
            }
        }

        for event in self.broker.poll_events().await {
            let BrokerEvent::Message { channel, data } = event;
            self.on_broker_receive(&channel, &data).await;
        }

        self.on_address_poll().await;
    }

    /// Handle a raw payload received over the mesh
    ///
    /// Decode failures and unknown types are dropped here; mesh delivery
    /// may retry on its own, the dispatcher never does.
    pub async fn on_mesh_receive(&mut self, from: u32, raw: &[u8]) {
        debug!(from, len = raw.len(), "mesh message received");

        let payload = match cudp::decode(raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(from, code = e.error_code(), "packet discarded: {e}");
                self.stats.decode_failures += 1;
                self.debug_publish(&format!("packet from {from} discarded: {e}"))
                    .await;
                return;
            }
        };

        let classified = match classify(&payload) {
            Ok(classified) => classified,
            Err(ClassifyError::UnknownType(code)) => {
                // Forward compatibility: newer senders may know types we don't
                debug!(from, code, "dropping message of unknown type");
                self.stats.classify_drops += 1;
                return;
            }
            Err(e) => {
                warn!(from, "dropping unclassifiable message: {e}");
                self.stats.classify_drops += 1;
                return;
            }
        };

        match classified.msg_type {
            MsgType::Measurements => {
                self.publish_measurements(from, classified.body).await;
            }
        }
    }

    /// React to a mesh connectivity change by republishing the topology
    pub async fn on_connectivity_changed(&mut self) {
        trace!("mesh connectivity changed");
        self.publish_topology().await;
    }

    /// Handle a control message from the broker
    pub async fn on_broker_receive(&mut self, channel: &str, _data: &[u8]) {
        if channel == self.config.channels.conn_check {
            debug!("connection check received");
            self.ack_connection().await;
        } else if channel == self.config.channels.topology_request {
            debug!("topology requested");
            self.publish_topology().await;
        } else {
            trace!(channel, "ignoring message on unhandled channel");
        }
    }

    /// Compare the station address against the last known one and drive
    /// the reconnect state machine
    pub async fn on_address_poll(&mut self) {
        let address = self.mesh.local_address().await;
        if address != self.current_address {
            info!(
                old = %self.current_address,
                new = %address,
                "bridge station address changed"
            );
            self.current_address = address;
            self.link_state = LinkState::Connecting;
            self.debug_publish(&format!("Ready! Bridge local IP is {}", self.current_address))
                .await;
        }

        if self.link_state != LinkState::Connecting {
            return;
        }

        self.stats.connect_attempts += 1;
        match self.broker.connect(&self.config.mesh.name).await {
            Ok(()) => {
                info!(client_id = %self.config.mesh.name, "connected to broker");
                if let Err(e) = self.broker.subscribe(&self.config.channels.dash_root).await {
                    warn!("control channel subscribe failed: {e}");
                }
                self.ack_connection().await;
                self.publish_topology().await;
                self.link_state = LinkState::Connected;
            }
            Err(e) => {
                self.stats.connect_failures += 1;
                debug!("broker connect failed, retrying on next poll: {e}");
            }
        }
    }

    /// Enrich a measurements body and publish it
    async fn publish_measurements(&mut self, origin: u32, body: JsonMap) {
        let message = MeshMessage {
            origin_id: origin,
            origin_name: self.mesh.resolve_name(origin).await,
            msg_type: MsgType::Measurements,
            body,
        };
        let published = message.to_published_payload(&self.clock.timestamp());
        let payload =
            Bytes::from(serde_json::to_vec(&published).expect("payload serialization"));

        match self
            .broker
            .publish(&self.config.channels.measurements, payload)
            .await
        {
            Ok(()) => {
                debug!(
                    origin,
                    name = ?message.origin_name,
                    "measurements republished"
                );
                self.stats.measurements_published += 1;
            }
            Err(e) => {
                warn!("measurements publish failed: {e}");
                self.stats.publish_failures += 1;
            }
        }
    }

    /// Rebuild the topology snapshot from current mesh state and publish it
    ///
    /// Best-effort: a failed publish is logged and the next trigger tries
    /// again with freshly fetched fragments.
    async fn publish_topology(&mut self) {
        let tree = self.mesh.connection_tree_json().await;
        let names = self.mesh.name_map_json().await;

        let snapshot = match TopologySnapshot::aggregate(&tree, &names) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("topology publish skipped: {e}");
                self.stats.aggregation_failures += 1;
                return;
            }
        };

        match self
            .broker
            .publish(&self.config.channels.topology_response, snapshot.to_bytes())
            .await
        {
            Ok(()) => {
                debug!("topology snapshot published");
                self.stats.topology_published += 1;
            }
            Err(e) => {
                warn!("topology publish failed: {e}");
                self.stats.publish_failures += 1;
            }
        }
    }

    /// Announce this bridge on the ack channel
    async fn ack_connection(&mut self) {
        let ack = serde_json::json!({
            "mesh_name": self.config.mesh.name,
            "mesh_network": self.config.station.ssid,
        });
        let payload = Bytes::from(ack.to_string());

        match self
            .broker
            .publish(&self.config.channels.conn_ack, payload)
            .await
        {
            Ok(()) => self.stats.acks_published += 1,
            Err(e) => {
                warn!("connection ack publish failed: {e}");
                self.stats.publish_failures += 1;
            }
        }
    }

    /// Mirror a line to the debug channel when enabled; advisory only
    async fn debug_publish(&mut self, text: &str) {
        if !self.config.mqtt_debug {
            return;
        }
        let _ = self
            .broker
            .publish(&self.config.channels.debug, Bytes::from(text.to_string()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coop_core::test_utils::{BrokerOp, FixedClock, MockBroker, MockMesh};
    use coop_protocol::message::Measurements;
    use serde_json::Value;
    use std::time::Duration;

    fn test_dispatcher() -> (
        BridgeDispatcher<MockMesh, MockBroker, FixedClock>,
        BridgeHandle,
    ) {
        let config = BridgeConfig::default();
        BridgeDispatcher::new(config, MockMesh::new(), MockBroker::new(), FixedClock::sample())
    }

    fn measurements_packet() -> Bytes {
        let payload = Measurements {
            temperature: 21.0,
            humidity: 50.0,
            luminosity: 0.5,
            hazardous_gas_warning: 0.0,
        }
        .into_payload();
        cudp::encode(&payload)
    }

    #[tokio::test]
    async fn test_measurements_are_enriched_and_republished() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher.mesh.names.insert(42, "hen-house-3".to_string());

        dispatcher.on_mesh_receive(42, &measurements_packet()).await;

        let channel = dispatcher.config.channels.measurements.clone();
        let published = dispatcher.broker.published_on(&channel);
        assert_eq!(published.len(), 1);

        let json: Value = serde_json::from_slice(published[0]).unwrap();
        assert_eq!(json["node_id"], 42);
        assert_eq!(json["node_name"], "hen-house-3");
        assert_eq!(json["timestamp"], "2024-05-17 12:00:00");
        assert_eq!(json["data"]["temperature"], 21.0);
        assert_eq!(dispatcher.stats.measurements_published, 1);
    }

    #[tokio::test]
    async fn test_unresolved_name_is_omitted() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher.on_mesh_receive(7, &measurements_packet()).await;

        let channel = dispatcher.config.channels.measurements.clone();
        let published = dispatcher.broker.published_on(&channel);
        let json: Value = serde_json::from_slice(published[0]).unwrap();
        assert_eq!(json["node_id"], 7);
        assert!(json.get("node_name").is_none());
    }

    #[tokio::test]
    async fn test_corrupt_packet_is_dropped() {
        let (mut dispatcher, _handle) = test_dispatcher();
        let mut packet = measurements_packet().to_vec();
        packet[3] ^= 0xFF;

        dispatcher.on_mesh_receive(42, &packet).await;

        assert!(dispatcher.broker.published.is_empty());
        assert_eq!(dispatcher.stats.decode_failures, 1);
    }

    #[tokio::test]
    async fn test_unknown_type_is_dropped_without_publish() {
        let (mut dispatcher, _handle) = test_dispatcher();
        let mut payload = JsonMap::new();
        payload.insert("msg_type".into(), serde_json::json!(999));
        payload.insert("data".into(), serde_json::json!({}));

        dispatcher.on_mesh_receive(42, &cudp::encode(&payload)).await;

        assert!(dispatcher.broker.published.is_empty());
        assert_eq!(dispatcher.stats.classify_drops, 1);
    }

    #[tokio::test]
    async fn test_reconnect_sequence_on_address_change() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher.mesh.address = "192.168.4.2".to_string();

        dispatcher.on_address_poll().await;

        assert_eq!(dispatcher.link_state(), LinkState::Connected);
        let channels = &dispatcher.config.channels;
        assert_eq!(
            dispatcher.broker.ops,
            vec![
                BrokerOp::Connect(dispatcher.config.mesh.name.clone()),
                BrokerOp::Subscribe(channels.dash_root.clone()),
                BrokerOp::Publish(channels.conn_ack.clone()),
                BrokerOp::Publish(channels.topology_response.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_connect_attempt_while_address_is_stable() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher.on_address_poll().await;
        dispatcher.on_address_poll().await;
        assert!(dispatcher.broker.ops.is_empty());
        assert_eq!(dispatcher.link_state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_every_poll() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher.broker.connect_ok = false;
        dispatcher.mesh.address = "192.168.4.2".to_string();

        dispatcher.on_address_poll().await;
        dispatcher.on_address_poll().await;
        assert_eq!(dispatcher.link_state(), LinkState::Connecting);
        assert_eq!(dispatcher.stats.connect_attempts, 2);
        assert_eq!(dispatcher.stats.connect_failures, 2);

        dispatcher.broker.connect_ok = true;
        dispatcher.on_address_poll().await;
        assert_eq!(dispatcher.link_state(), LinkState::Connected);
        assert_eq!(dispatcher.stats.connect_attempts, 3);
    }

    #[tokio::test]
    async fn test_conn_check_triggers_ack() {
        let (mut dispatcher, _handle) = test_dispatcher();
        let channel = dispatcher.config.channels.conn_check.clone();

        dispatcher.on_broker_receive(&channel, b"hello").await;

        let ack_channel = dispatcher.config.channels.conn_ack.clone();
        let published = dispatcher.broker.published_on(&ack_channel);
        assert_eq!(published.len(), 1);
        let json: Value = serde_json::from_slice(published[0]).unwrap();
        assert_eq!(json["mesh_name"], "iop_mesh_default");
        assert_eq!(json["mesh_network"], "default_wifi");
    }

    #[tokio::test]
    async fn test_topology_request_triggers_publish() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher.mesh.tree_json = r#"{"nodeId": 1}"#.to_string();
        dispatcher.mesh.name_map_json = r#"{"1": "bridge"}"#.to_string();
        let channel = dispatcher.config.channels.topology_request.clone();

        dispatcher.on_broker_receive(&channel, b"").await;

        let response = dispatcher.config.channels.topology_response.clone();
        let published = dispatcher.broker.published_on(&response);
        assert_eq!(published.len(), 1);
        let json: Value = serde_json::from_slice(published[0]).unwrap();
        assert_eq!(json["mesh_tree"]["nodeId"], 1);
        assert_eq!(json["name_map"]["1"], "bridge");
    }

    #[tokio::test]
    async fn test_unknown_channel_is_ignored() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher
            .on_broker_receive("internet-of-poultry/other", b"x")
            .await;
        assert!(dispatcher.broker.published.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_fragment_skips_topology_publish() {
        let (mut dispatcher, _handle) = test_dispatcher();
        dispatcher.mesh.tree_json = "{broken".to_string();
        let channel = dispatcher.config.channels.topology_request.clone();

        dispatcher.on_broker_receive(&channel, b"").await;

        assert!(dispatcher.broker.published.is_empty());
        assert_eq!(dispatcher.stats.aggregation_failures, 1);
    }

    #[tokio::test]
    async fn test_connectivity_handled_before_received_in_one_iteration() {
        let (mut dispatcher, _handle) = test_dispatcher();
        // Received is queued first, ConnectivityChanged second; the
        // topology publish must still come out ahead of the measurements.
        dispatcher.mesh.push_received(42, measurements_packet());
        dispatcher.mesh.push_event(MeshEvent::ConnectivityChanged);

        dispatcher.service_transports().await;

        let channels = dispatcher.config.channels.clone();
        let publishes: Vec<&BrokerOp> = dispatcher
            .broker
            .ops
            .iter()
            .filter(|op| matches!(op, BrokerOp::Publish(_)))
            .collect();
        assert_eq!(
            publishes[0],
            &BrokerOp::Publish(channels.topology_response.clone())
        );
        assert_eq!(
            publishes[1],
            &BrokerOp::Publish(channels.measurements.clone())
        );
    }

    #[tokio::test]
    async fn test_debug_channel_mirrors_drops_when_enabled() {
        let config = crate::config::BridgeConfigBuilder::new().mqtt_debug(true).build();
        let (mut dispatcher, _handle) = BridgeDispatcher::new(
            config,
            MockMesh::new(),
            MockBroker::new(),
            FixedClock::sample(),
        );

        dispatcher.on_mesh_receive(5, b"garbage").await;

        let debug_channel = dispatcher.config.channels.debug.clone();
        assert_eq!(dispatcher.broker.published_on(&debug_channel).len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_shutdown_via_handle() {
        let config = crate::config::BridgeConfigBuilder::new()
            .poll_interval(Duration::from_millis(5))
            .build();
        let (dispatcher, handle) = BridgeDispatcher::new(
            config,
            MockMesh::new(),
            MockBroker::new(),
            FixedClock::sample(),
        );

        let task = tokio::spawn(dispatcher.run());
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.measurements_published, 0);
        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }
}
