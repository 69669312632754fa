//! In-memory stand-ins for the external collaborators
//!
//! The simulator wires the same dispatcher and sensor code that would run
//! on hardware to channel-backed transports: a hub that routes unicasts by
//! name and fans out connectivity events, a loopback broker that logs
//! every publish, and a synthetic sensor source with jittered readings.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use coop_core::transport::{
    BrokerEvent, BrokerTransport, Destination, MeshEvent, MeshTransport, TransportError,
};
use coop_sensor::{SensorReading, SensorSource};

type EventSender = tokio::sync::mpsc::UnboundedSender<MeshEvent>;
type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<MeshEvent>;

struct NodeSlot {
    id: u32,
    tx: EventSender,
}

struct HubState {
    root_name: String,
    next_id: u32,
    nodes: HashMap<String, NodeSlot>,
}

/// Routing hub shared by every simulated node
///
/// Joins hand out numeric ids the way the real transport derives them from
/// hardware; every join notifies existing members that the connection tree
/// changed.
pub struct MeshHub {
    state: Arc<Mutex<HubState>>,
}

impl MeshHub {
    /// Create a hub whose connection tree is rooted at `root_name`
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                root_name: root_name.into(),
                next_id: 1_000_001,
                nodes: HashMap::new(),
            })),
        }
    }

    /// Join the mesh under the given name
    pub fn join(&self, name: impl Into<String>) -> SimMesh {
        let name = name.into();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let id = {
            let mut state = self.state.lock().expect("hub lock");
            let id = state.next_id;
            state.next_id += 1;
            state.nodes.insert(name.clone(), NodeSlot { id, tx });
            for (other, slot) in &state.nodes {
                if other != &name {
                    let _ = slot.tx.send(MeshEvent::ConnectivityChanged);
                }
            }
            id
        };

        debug!(name = %name, id, "node joined simulated mesh");
        SimMesh {
            name,
            id,
            rx,
            hub: Arc::clone(&self.state),
            address: Arc::new(Mutex::new("0.0.0.0".to_string())),
        }
    }
}

/// One node's view of the simulated mesh
pub struct SimMesh {
    name: String,
    id: u32,
    rx: EventReceiver,
    hub: Arc<Mutex<HubState>>,
    address: Arc<Mutex<String>>,
}

impl SimMesh {
    /// Shared handle to this node's station address
    ///
    /// The simulation flips the bridge's address from `0.0.0.0` to a real
    /// one to trigger the reconnect path, the way DHCP eventually hands
    /// the device a lease.
    pub fn station_address_handle(&self) -> Arc<Mutex<String>> {
        Arc::clone(&self.address)
    }

    /// This node's numeric mesh id
    pub fn node_id(&self) -> u32 {
        self.id
    }
}

#[async_trait]
impl MeshTransport for SimMesh {
    async fn send(&mut self, dest: Destination, payload: Bytes) -> Result<(), TransportError> {
        let state = self.hub.lock().expect("hub lock");
        match dest {
            Destination::Node(name) => {
                let slot = state
                    .nodes
                    .get(&name)
                    .ok_or_else(|| TransportError::SendFailed(format!("no node named {name}")))?;
                slot.tx
                    .send(MeshEvent::Received {
                        from: self.id,
                        data: payload,
                    })
                    .map_err(|_| TransportError::ChannelClosed)
            }
            Destination::Broadcast => {
                for (other, slot) in &state.nodes {
                    if other != &self.name {
                        let _ = slot.tx.send(MeshEvent::Received {
                            from: self.id,
                            data: payload.clone(),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    async fn poll_events(&mut self) -> Vec<MeshEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn local_address(&self) -> String {
        self.address.lock().expect("address lock").clone()
    }

    async fn resolve_name(&self, node_id: u32) -> Option<String> {
        let state = self.hub.lock().expect("hub lock");
        state
            .nodes
            .iter()
            .find(|(_, slot)| slot.id == node_id)
            .map(|(name, _)| name.clone())
    }

    async fn connection_tree_json(&self) -> String {
        let state = self.hub.lock().expect("hub lock");
        let root_id = state
            .nodes
            .get(&state.root_name)
            .map(|slot| slot.id)
            .unwrap_or(0);
        let subs: Vec<serde_json::Value> = state
            .nodes
            .iter()
            .filter(|(name, _)| **name != state.root_name)
            .map(|(_, slot)| serde_json::json!({ "nodeId": slot.id }))
            .collect();
        serde_json::json!({ "nodeId": root_id, "subs": subs }).to_string()
    }

    async fn name_map_json(&self) -> String {
        let state = self.hub.lock().expect("hub lock");
        let map: serde_json::Map<String, serde_json::Value> = state
            .nodes
            .iter()
            .map(|(name, slot)| (slot.id.to_string(), serde_json::Value::from(name.clone())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

/// Broker that logs every operation instead of talking to a server
///
/// After the first successful connect it queues one dashboard hello so the
/// bridge's ack path is exercised in every simulation run.
pub struct LoopbackBroker {
    hello_channel: String,
    pending: Vec<BrokerEvent>,
    greeted: bool,
}

impl LoopbackBroker {
    /// Create a loopback broker that will greet on `hello_channel`
    pub fn new(hello_channel: impl Into<String>) -> Self {
        Self {
            hello_channel: hello_channel.into(),
            pending: Vec::new(),
            greeted: false,
        }
    }
}

#[async_trait]
impl BrokerTransport for LoopbackBroker {
    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        info!(client_id, "loopback broker connected");
        if !self.greeted {
            self.greeted = true;
            self.pending.push(BrokerEvent::Message {
                channel: self.hello_channel.clone(),
                data: Bytes::from_static(b"hello"),
            });
        }
        Ok(())
    }

    async fn publish(&mut self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        info!(channel, payload = %String::from_utf8_lossy(&payload), "broker publish");
        Ok(())
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), TransportError> {
        info!(channel, "broker subscribe");
        Ok(())
    }

    async fn poll_events(&mut self) -> Vec<BrokerEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Sensor source producing plausible jittered readings
pub struct SyntheticSensor {
    rng: StdRng,
}

impl SyntheticSensor {
    /// Create a synthetic sensor seeded from system entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SyntheticSensor {
    fn read(&mut self) -> SensorReading {
        SensorReading {
            temperature: 21.0 + self.rng.gen_range(-1.5..1.5),
            humidity: 55.0 + self.rng.gen_range(-5.0..5.0),
            luminosity: self.rng.gen_range(0.3..0.8),
            hazardous_gas_warning: if self.rng.gen_bool(0.02) { 1.0 } else { 0.0 },
        }
    }
}
