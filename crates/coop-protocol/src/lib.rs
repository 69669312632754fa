//! Coop Protocol - CUDP packet format and message classification
//!
//! CUDP ("checksum UDP") is the application-layer framing used to move
//! small JSON payloads over the mesh: the serialized JSON object followed
//! immediately by the CRC32 of those exact bytes as 8 lowercase hex digits,
//! with no delimiter. A packet whose checksum does not match is discarded
//! whole; it is never partially trusted.
//!
//! ```text
//! <json-object-bytes><8-hex-digit-crc32>
//! ```
//!
//! # Modules
//!
//! - [`cudp`] - Pure encode/decode of the wire format
//! - [`message`] - Message type discriminants and payload shapes
//! - [`classify`] - Semantic classification of decoded payloads
//!
//! # Example
//!
//! ```rust
//! use coop_protocol::{cudp, classify::classify};
//!
//! let mut payload = serde_json::Map::new();
//! payload.insert("msg_type".into(), 0u32.into());
//! payload.insert("data".into(), serde_json::json!({"temperature": 21.0}));
//!
//! let packet = cudp::encode(&payload);
//! let decoded = cudp::decode(&packet).unwrap();
//! assert_eq!(decoded, payload);
//!
//! let classified = classify(&decoded).unwrap();
//! assert_eq!(classified.body["temperature"], 21.0);
//! ```

pub mod classify;
pub mod cudp;
pub mod message;

// Re-exports for convenience
pub use classify::{classify, Classified, ClassifyError};
pub use cudp::{decode, encode, DecodeError, CHECKSUM_HEX_LEN};
pub use message::{JsonMap, Measurements, MeshMessage, MsgType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
