//! Bridge configuration
//!
//! Everything here is a deploy-time constant on the device; the structs
//! exist so tests and the simulator can vary them. Defaults consolidate
//! the superset of channel names the deployed variants used, with the
//! dashboard-facing (`dash/`) and mesh-facing (`mesh/`) prefixes kept
//! distinct so a wildcard subscription to the dash subtree never echoes
//! the bridge's own publishes back at it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between reachability polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Mesh network identity and radio settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSettings {
    /// Mesh network name, also used as the broker client id
    pub name: String,
    /// Mesh network password (opaque, passed through to the transport)
    pub password: String,
    /// Mesh port
    pub port: u16,
    /// Radio channel; must match the access network's channel
    pub channel: u8,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            name: "iop_mesh_default".to_string(),
            password: "default_password".to_string(),
            port: 5555,
            channel: 1,
        }
    }
}

/// Access network (uplink) credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSettings {
    /// Access point SSID
    pub ssid: String,
    /// Access point password (opaque)
    pub password: String,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            ssid: "default_wifi".to_string(),
            password: "default_wifi_password".to_string(),
        }
    }
}

/// Broker endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "broker.hivemq.com".to_string(),
            port: 1883,
        }
    }
}

/// Logical broker channel names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelNames {
    /// Enriched measurements go here
    pub measurements: String,
    /// Dashboard asks for topology here
    pub topology_request: String,
    /// Topology snapshots go here
    pub topology_response: String,
    /// Dashboard hello messages arrive here
    pub conn_check: String,
    /// Bridge acks go here
    pub conn_ack: String,
    /// Wildcard subscription covering the whole dashboard subtree
    pub dash_root: String,
    /// Advisory debug sink, only used when debug publishing is on
    pub debug: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            measurements: "internet-of-poultry/mesh/measurements".to_string(),
            topology_request: "internet-of-poultry/dash/topology-request".to_string(),
            topology_response: "internet-of-poultry/mesh/topology-response".to_string(),
            conn_check: "internet-of-poultry/dash/hello".to_string(),
            conn_ack: "internet-of-poultry/mesh/hello".to_string(),
            dash_root: "internet-of-poultry/dash/#".to_string(),
            debug: "internet-of-poultry/debug".to_string(),
        }
    }
}

/// Full bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Mesh network settings
    #[serde(default)]
    pub mesh: MeshSettings,

    /// Uplink credentials
    #[serde(default)]
    pub station: StationSettings,

    /// Broker endpoint
    #[serde(default)]
    pub broker: BrokerSettings,

    /// Broker channel names
    #[serde(default)]
    pub channels: ChannelNames,

    /// Logical name sensor nodes address their packets to
    #[serde(default = "default_bridge_name")]
    pub bridge_name: String,

    /// Mirror notable events to the debug channel
    #[serde(default)]
    pub mqtt_debug: bool,

    /// Interval between reachability polls
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
}

fn default_bridge_name() -> String {
    "default_bridge_name".to_string()
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mesh: MeshSettings::default(),
            station: StationSettings::default(),
            broker: BrokerSettings::default(),
            channels: ChannelNames::default(),
            bridge_name: default_bridge_name(),
            mqtt_debug: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Builder for [`BridgeConfig`]
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mesh network name (also the broker client id)
    pub fn mesh_name(mut self, name: impl Into<String>) -> Self {
        self.config.mesh.name = name.into();
        self
    }

    /// Set the bridge's logical mesh name
    pub fn bridge_name(mut self, name: impl Into<String>) -> Self {
        self.config.bridge_name = name.into();
        self
    }

    /// Set the access network SSID
    pub fn station_ssid(mut self, ssid: impl Into<String>) -> Self {
        self.config.station.ssid = ssid.into();
        self
    }

    /// Set the broker endpoint
    pub fn broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.broker = BrokerSettings {
            host: host.into(),
            port,
        };
        self
    }

    /// Set the reachability poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Enable or disable debug-channel mirroring
    pub fn mqtt_debug(mut self, enabled: bool) -> Self {
        self.config.mqtt_debug = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.mesh.name, "iop_mesh_default");
        assert_eq!(config.broker.port, 1883);
        assert!(!config.mqtt_debug);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfigBuilder::new()
            .mesh_name("barn_mesh")
            .bridge_name("barn_bridge")
            .broker("10.0.0.5", 1884)
            .mqtt_debug(true)
            .build();

        assert_eq!(config.mesh.name, "barn_mesh");
        assert_eq!(config.bridge_name, "barn_bridge");
        assert_eq!(config.broker.host, "10.0.0.5");
        assert!(config.mqtt_debug);
    }

    #[test]
    fn test_channel_names_keep_dash_and_mesh_prefixes_apart() {
        let channels = ChannelNames::default();
        assert!(channels.conn_check.contains("/dash/"));
        assert!(channels.conn_ack.contains("/mesh/"));
        assert!(channels.topology_request.contains("/dash/"));
        assert!(channels.topology_response.contains("/mesh/"));
    }

    #[test]
    fn test_poll_interval_round_trips_through_humantime() {
        let config = BridgeConfigBuilder::new()
            .poll_interval(Duration::from_secs(2))
            .build();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"poll_interval\":\"2s\""));
        let back: BridgeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.poll_interval, Duration::from_secs(2));
    }
}
