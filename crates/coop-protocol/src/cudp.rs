//! CUDP wire format: JSON object bytes + 8-hex-digit CRC32 trailer
//!
//! Both directions are pure transforms. Each call builds its own
//! [`crc32fast::Hasher`]; no checksum state is shared between calls, so an
//! encode can never leak accumulator state into the next one.
//!
//! The checksum covers the serialized byte form, not an abstract value, so
//! encoding is deterministic: `serde_json` is built with `preserve_order`
//! and key order survives a decode/encode round trip.

use bytes::Bytes;
use thiserror::Error;

use crate::message::JsonMap;

/// Length of the hex checksum trailer
pub const CHECKSUM_HEX_LEN: usize = 8;

/// Errors produced while decoding a CUDP packet
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Packet cannot hold a checksum trailer, or the trailer is not hex
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// Recomputed CRC32 does not match the trailer; discard the packet
    #[error("checksum mismatch: packet says {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum carried in the packet trailer
        expected: u32,
        /// Checksum recomputed over the payload bytes
        computed: u32,
    },

    /// Checksum matched but the prefix is not a JSON object
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl DecodeError {
    /// Short code for logging and stats
    pub fn error_code(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "MALFORMED",
            DecodeError::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            DecodeError::InvalidPayload(_) => "INVALID_PAYLOAD",
        }
    }
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Encode a payload into a CUDP packet
///
/// Serializes the payload, computes CRC32 over those exact bytes and
/// appends it as 8 lowercase hex digits. Same payload always yields the
/// same bytes.
pub fn encode(payload: &JsonMap) -> Bytes {
    // A Map<String, Value> always serializes; non-finite floats were
    // already lowered to null on insertion.
    let json = serde_json::to_string(payload).expect("JSON object serialization");
    let checksum = crc32(json.as_bytes());
    Bytes::from(format!("{json}{checksum:08x}"))
}

/// Decode a CUDP packet back into its payload
///
/// The last 8 bytes are the checksum field; everything before them is the
/// serialized payload. Any failure means the packet must be discarded
/// without acting on it.
pub fn decode(packet: &[u8]) -> Result<JsonMap, DecodeError> {
    if packet.len() < CHECKSUM_HEX_LEN {
        return Err(DecodeError::Malformed(format!(
            "{} bytes cannot hold a checksum trailer",
            packet.len()
        )));
    }

    let (payload_bytes, trailer) = packet.split_at(packet.len() - CHECKSUM_HEX_LEN);
    let trailer = std::str::from_utf8(trailer)
        .map_err(|_| DecodeError::Malformed("checksum trailer is not UTF-8".to_string()))?;
    let expected = u32::from_str_radix(trailer, 16)
        .map_err(|_| DecodeError::Malformed(format!("checksum trailer is not hex: {trailer:?}")))?;

    let computed = crc32(payload_bytes);
    if expected != computed {
        return Err(DecodeError::ChecksumMismatch { expected, computed });
    }

    let value: serde_json::Value = serde_json::from_slice(payload_bytes)
        .map_err(|e| DecodeError::InvalidPayload(e.to_string()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(DecodeError::InvalidPayload(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
