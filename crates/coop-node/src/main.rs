//! Local simulation harness
//!
//! Runs one bridge and a handful of sensor nodes against an in-memory mesh
//! and a loopback broker, so the whole pipeline can be watched from a
//! terminal: sampling, averaging, CUDP framing, decode, enrichment, and
//! the republish onto broker channels.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coop_bridge::{BridgeConfigBuilder, BridgeDispatcher};
use coop_core::SystemClock;
use coop_sensor::{SensorConfigBuilder, SensorNode};

mod sim;

use sim::{LoopbackBroker, MeshHub, SyntheticSensor};

#[derive(Parser, Debug)]
#[command(name = "coop-node")]
#[command(about = "Simulated coop mesh: one bridge, N sensor nodes, loopback broker")]
struct Args {
    /// Number of sensor nodes to run
    #[arg(long, default_value_t = 2)]
    sensors: u32,

    /// How long to run before shutting down
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Sensor sampling interval
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    sample_interval: Duration,

    /// Sensor send interval
    #[arg(long, default_value = "8s", value_parser = humantime::parse_duration)]
    send_interval: Duration,

    /// Bridge reachability poll interval
    #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    poll_interval: Duration,

    /// Mirror notable bridge events onto the debug channel
    #[arg(long)]
    mqtt_debug: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let bridge_config = BridgeConfigBuilder::new()
        .mesh_name("iop_mesh_sim")
        .bridge_name("coop_bridge")
        .poll_interval(args.poll_interval)
        .mqtt_debug(args.mqtt_debug)
        .build();
    let conn_check_channel = bridge_config.channels.conn_check.clone();

    let hub = MeshHub::new("coop_bridge");

    let bridge_mesh = hub.join("coop_bridge");
    let station_address = bridge_mesh.station_address_handle();
    let broker = LoopbackBroker::new(conn_check_channel);

    let (bridge, bridge_handle) =
        BridgeDispatcher::new(bridge_config, bridge_mesh, broker, SystemClock);
    let bridge_task = tokio::spawn(bridge.run());

    let mut sensor_handles = Vec::new();
    let mut sensor_tasks = Vec::new();
    for i in 1..=args.sensors {
        let name = format!("hen-house-{i}");
        let config = SensorConfigBuilder::new()
            .node_name(&name)
            .bridge_name("coop_bridge")
            .sample_interval(args.sample_interval)
            .send_interval(args.send_interval)
            .build();
        let mesh = hub.join(&name);
        let (node, handle) = SensorNode::new(config, mesh, SyntheticSensor::new());
        sensor_handles.push((name, handle));
        sensor_tasks.push(tokio::spawn(node.run()));
    }

    // The uplink comes up a moment after boot, like a DHCP lease landing;
    // the bridge notices on its next reachability poll.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        *station_address.lock().expect("address lock") = "192.168.4.2".to_string();
    });

    info!(
        sensors = args.sensors,
        duration = %humantime::format_duration(args.duration),
        "simulation running"
    );
    tokio::time::sleep(args.duration).await;

    for (name, handle) in &sensor_handles {
        let stats = handle.stats().await?;
        info!(
            node = %name,
            samples_read = stats.samples_read,
            packets_sent = stats.packets_sent,
            "sensor node finished"
        );
        handle.shutdown().await?;
    }
    for task in sensor_tasks {
        task.await??;
    }

    let stats = bridge_handle.stats().await?;
    let link_state = bridge_handle.link_state().await?;
    info!(
        link_state = %link_state,
        measurements_published = stats.measurements_published,
        topology_published = stats.topology_published,
        acks_published = stats.acks_published,
        decode_failures = stats.decode_failures,
        "bridge finished"
    );
    bridge_handle.shutdown().await?;
    bridge_task.await??;

    Ok(())
}
