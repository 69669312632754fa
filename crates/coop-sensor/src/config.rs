//! Sensor node configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between sensor reads
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Default interval between sends to the bridge
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for one sensor node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// This node's assigned mesh name
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Logical name of the bridge node measurements are sent to
    #[serde(default = "default_bridge_name")]
    pub bridge_name: String,

    /// Interval between sensor reads; faster than the send interval
    #[serde(with = "humantime_serde", default = "default_sample_interval")]
    pub sample_interval: Duration,

    /// Interval between averaged sends to the bridge
    #[serde(with = "humantime_serde", default = "default_send_interval")]
    pub send_interval: Duration,
}

fn default_node_name() -> String {
    "default_node_name".to_string()
}

fn default_bridge_name() -> String {
    "default_bridge_name".to_string()
}

fn default_sample_interval() -> Duration {
    DEFAULT_SAMPLE_INTERVAL
}

fn default_send_interval() -> Duration {
    DEFAULT_SEND_INTERVAL
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            bridge_name: default_bridge_name(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            send_interval: DEFAULT_SEND_INTERVAL,
        }
    }
}

/// Builder for [`SensorConfig`]
#[derive(Debug, Default)]
pub struct SensorConfigBuilder {
    config: SensorConfig,
}

impl SensorConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set this node's mesh name
    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.config.node_name = name.into();
        self
    }

    /// Set the bridge's logical name
    pub fn bridge_name(mut self, name: impl Into<String>) -> Self {
        self.config.bridge_name = name.into();
        self
    }

    /// Set the sampling interval
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.config.sample_interval = interval;
        self
    }

    /// Set the send interval
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.config.send_interval = interval;
        self
    }

    /// Build the configuration
    pub fn build(self) -> SensorConfig {
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
