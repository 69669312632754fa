//! Message types carried over CUDP and their published forms
//!
//! A mesh payload is a JSON object with a numeric `msg_type` discriminant
//! and a type-specific `data` sub-object. The bridge enriches messages with
//! provenance (`node_id`, `node_name`, `timestamp`) before republishing;
//! senders never set those fields themselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered JSON object, the unit the codec and classifier work on
pub type JsonMap = serde_json::Map<String, Value>;

/// Payload key holding the message type discriminant
pub const MSG_TYPE_KEY: &str = "msg_type";
/// Payload key holding the type-specific body
pub const DATA_KEY: &str = "data";
/// Enrichment key: numeric mesh id of the sender
pub const NODE_ID_KEY: &str = "node_id";
/// Enrichment key: resolved sender name, omitted when unresolved
pub const NODE_NAME_KEY: &str = "node_name";
/// Enrichment key: bridge-side receive timestamp
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Message type discriminants
///
/// One variant is defined today; unrecognized codes are dropped rather than
/// treated as errors so newer senders can coexist with older bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum MsgType {
    /// Averaged sensor measurements from a node
    Measurements = 0,
}

impl MsgType {
    /// Map a wire discriminant to a known type
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MsgType::Measurements),
            _ => None,
        }
    }

    /// Wire discriminant for this type
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Averaged sensor readings, the body of a `Measurements` message
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurements {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Normalized light level, 0.0 to 1.0
    pub luminosity: f64,
    /// Gas sensor trip ratio over the averaging window
    pub hazardous_gas_warning: f64,
}

impl Measurements {
    /// Build the CUDP payload for these measurements
    ///
    /// Key order is fixed (`msg_type`, then `data`) so the encoded packet
    /// is byte-stable for a given value.
    pub fn into_payload(self) -> JsonMap {
        let mut payload = JsonMap::new();
        payload.insert(
            MSG_TYPE_KEY.to_string(),
            Value::from(MsgType::Measurements.code()),
        );
        payload.insert(
            DATA_KEY.to_string(),
            serde_json::to_value(self).expect("measurements serialize"),
        );
        payload
    }
}

/// A validated, classified mesh message
///
/// Produced from exactly one CUDP packet that passed the checksum; invalid
/// packets never become a `MeshMessage`.
#[derive(Debug, Clone)]
pub struct MeshMessage {
    /// Sender's numeric mesh id (stable per session, not across reboots)
    pub origin_id: u32,
    /// Sender's assigned name, if the transport could resolve it
    pub origin_name: Option<String>,
    /// Classified message type
    pub msg_type: MsgType,
    /// Type-specific body (the payload's `data` sub-object)
    pub body: JsonMap,
}

impl MeshMessage {
    /// Build the enriched JSON object published to the broker
    ///
    /// `node_name` is omitted entirely when the sender's name could not be
    /// resolved, matching what dashboard consumers expect.
    pub fn to_published_payload(&self, timestamp: &str) -> JsonMap {
        let mut payload = JsonMap::new();
        payload.insert(MSG_TYPE_KEY.to_string(), Value::from(self.msg_type.code()));
        payload.insert(DATA_KEY.to_string(), Value::Object(self.body.clone()));
        payload.insert(NODE_ID_KEY.to_string(), Value::from(self.origin_id));
        if let Some(name) = &self.origin_name {
            payload.insert(NODE_NAME_KEY.to_string(), Value::from(name.clone()));
        }
        payload.insert(TIMESTAMP_KEY.to_string(), Value::from(timestamp));
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_codes() {
        assert_eq!(MsgType::from_code(0), Some(MsgType::Measurements));
        assert_eq!(MsgType::from_code(999), None);
        assert_eq!(MsgType::from_code(-1), None);
        assert_eq!(MsgType::Measurements.code(), 0);
    }

    #[test]
    fn test_measurements_payload_shape() {
        let payload = Measurements {
            temperature: 21.0,
            humidity: 50.0,
            luminosity: 0.5,
            hazardous_gas_warning: 0.0,
        }
        .into_payload();

        assert_eq!(payload[MSG_TYPE_KEY], 0);
        assert_eq!(payload[DATA_KEY]["temperature"], 21.0);
        let keys: Vec<&String> = payload.keys().collect();
        assert_eq!(keys, vec![MSG_TYPE_KEY, DATA_KEY]);
    }

    #[test]
    fn test_published_payload_with_name() {
        let msg = MeshMessage {
            origin_id: 42,
            origin_name: Some("hen-house-3".to_string()),
            msg_type: MsgType::Measurements,
            body: Measurements::default().into_payload()[DATA_KEY]
                .as_object()
                .unwrap()
                .clone(),
        };
        let published = msg.to_published_payload("2024-05-17 12:00:00");
        assert_eq!(published[NODE_ID_KEY], 42);
        assert_eq!(published[NODE_NAME_KEY], "hen-house-3");
        assert_eq!(published[TIMESTAMP_KEY], "2024-05-17 12:00:00");
    }

    #[test]
    fn test_published_payload_omits_unresolved_name() {
        let msg = MeshMessage {
            origin_id: 42,
            origin_name: None,
            msg_type: MsgType::Measurements,
            body: JsonMap::new(),
        };
        let published = msg.to_published_payload("2024-05-17 12:00:00");
        assert!(!published.contains_key(NODE_NAME_KEY));
    }
}
