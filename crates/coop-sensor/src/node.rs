//! SensorNode - periodic sampling and sending runtime
//!
//! Two independent schedules drive the node: the sample tick folds a fresh
//! reading into the accumulator, the send tick averages and ships. Both
//! run on the node's single cooperative loop, so the accumulator needs no
//! locking; the send path reads and resets it atomically via
//! [`Accumulator::take_average`].
//!
//! A failed send is dropped; the next send tick starts a fresh averaging
//! window. Mesh payloads addressed to this node are logged and otherwise
//! ignored, the bridge never commands sensor nodes today.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use coop_core::transport::{Destination, MeshEvent, MeshTransport};
use coop_protocol::cudp;

use crate::accumulator::Accumulator;
use crate::config::SensorConfig;
use crate::source::SensorSource;

/// Commands that can be sent to a running sensor node
#[derive(Debug)]
pub enum SensorCommand {
    /// Get node statistics
    GetStats(oneshot::Sender<SensorStats>),
    /// Shut the node down
    Shutdown,
}

/// Handle for controlling a running [`SensorNode`]
#[derive(Clone)]
pub struct SensorHandle {
    command_tx: mpsc::Sender<SensorCommand>,
}

/// The handle's send half is gone; the node has stopped
#[derive(Debug, thiserror::Error)]
#[error("sensor node control channel closed")]
pub struct SensorHandleClosed;

impl SensorHandle {
    /// Get node statistics
    pub async fn stats(&self) -> Result<SensorStats, SensorHandleClosed> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SensorCommand::GetStats(tx))
            .await
            .map_err(|_| SensorHandleClosed)?;
        rx.await.map_err(|_| SensorHandleClosed)
    }

    /// Shut the node down
    pub async fn shutdown(&self) -> Result<(), SensorHandleClosed> {
        self.command_tx
            .send(SensorCommand::Shutdown)
            .await
            .map_err(|_| SensorHandleClosed)
    }
}

/// Sensor node statistics
#[derive(Debug, Clone, Default)]
pub struct SensorStats {
    /// Samples read since start
    pub samples_read: u64,
    /// Measurement packets sent to the bridge
    pub packets_sent: u64,
    /// Send ticks skipped because no samples were accumulated
    pub empty_send_ticks: u64,
    /// Sends the mesh transport rejected
    pub send_failures: u64,
}

/// A measuring node: samples, averages, ships to the bridge
pub struct SensorNode<M, S> {
    config: SensorConfig,
    mesh: M,
    source: S,
    accumulator: Accumulator,
    stats: SensorStats,
    command_rx: mpsc::Receiver<SensorCommand>,
    running: bool,
}

impl<M, S> SensorNode<M, S>
where
    M: MeshTransport,
    S: SensorSource,
{
    /// Create a sensor node and its control handle
    pub fn new(config: SensorConfig, mesh: M, source: S) -> (Self, SensorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let handle = SensorHandle { command_tx };

        let node = Self {
            config,
            mesh,
            source,
            accumulator: Accumulator::new(),
            stats: SensorStats::default(),
            command_rx,
            running: false,
        };

        (node, handle)
    }

    /// Node statistics so far
    pub fn stats(&self) -> &SensorStats {
        &self.stats
    }

    /// Samples currently accumulated
    pub fn sample_count(&self) -> u32 {
        self.accumulator.sample_count()
    }

    /// The mesh transport (for inspection in tests and the simulator)
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// Read the sensors once and fold the reading into the accumulator
    pub fn on_sample_tick(&mut self) {
        let reading = self.source.read();
        debug!(
            node = %self.config.node_name,
            temperature = reading.temperature,
            humidity = reading.humidity,
            luminosity = reading.luminosity,
            gas = reading.hazardous_gas_warning,
            "sensor sample"
        );
        self.accumulator.add(&reading);
        self.stats.samples_read += 1;
    }

    /// Average the window, pack it, and unicast it to the bridge
    ///
    /// Skips entirely when no samples were accumulated this window.
    pub async fn on_send_tick(&mut self) {
        let Some(average) = self.accumulator.take_average() else {
            debug!(node = %self.config.node_name, "no samples this window, skipping send");
            self.stats.empty_send_ticks += 1;
            return;
        };

        let packet = cudp::encode(&average.into_payload());
        let dest = Destination::Node(self.config.bridge_name.clone());
        match self.mesh.send(dest, packet).await {
            Ok(()) => {
                debug!(
                    node = %self.config.node_name,
                    bridge = %self.config.bridge_name,
                    "measurements sent"
                );
                self.stats.packets_sent += 1;
            }
            Err(e) => {
                // Dropped; the next window will carry fresh samples
                warn!(node = %self.config.node_name, "measurements send failed: {e}");
                self.stats.send_failures += 1;
            }
        }
    }

    /// Run the node's cooperative loop until shut down
    pub async fn run(mut self) -> Result<(), SensorHandleClosed> {
        info!(
            node = %self.config.node_name,
            bridge = %self.config.bridge_name,
            "starting sensor node"
        );
        let mut sample = tokio::time::interval(self.config.sample_interval);
        let mut send = tokio::time::interval(self.config.send_interval);
        // The immediate first send tick would always find an empty window
        send.reset();
        self.running = true;

        while self.running {
            tokio::select! {
                _ = sample.tick() => {
                    self.on_sample_tick();
                    self.drain_mesh_events().await;
                }
                _ = send.tick() => {
                    self.on_send_tick().await;
                }
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SensorCommand::GetStats(tx) => {
                            let _ = tx.send(self.stats.clone());
                        }
                        SensorCommand::Shutdown => {
                            info!(node = %self.config.node_name, "sensor node shutdown requested");
                            self.running = false;
                        }
                    }
                }
            }
        }

        info!(node = %self.config.node_name, "sensor node stopped");
        Ok(())
    }

    async fn drain_mesh_events(&mut self) {
        for event in self.mesh.poll_events().await {
            match event {
                MeshEvent::Received { from, data } => {
                    debug!(
                        node = %self.config.node_name,
                        from,
                        len = data.len(),
                        "mesh message received"
                    );
                }
                MeshEvent::ConnectivityChanged => {
                    debug!(node = %self.config.node_name, "mesh connections changed");
                }
            }
        }
    }
}
