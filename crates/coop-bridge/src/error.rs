//! Error types for bridge operations
//!
//! None of these are fatal to the process. The dispatcher's run loop logs,
//! counts, and keeps going; errors surface to callers only through the
//! control handle.

use thiserror::Error;

use coop_core::transport::TransportError;
use coop_protocol::classify::ClassifyError;
use coop_protocol::cudp::DecodeError;

use crate::topology::AggregationError;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// CUDP packet failed to decode
    #[error("packet decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Decoded payload failed classification
    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),

    /// Topology fragments could not be merged
    #[error("topology aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),

    /// A transport call failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Control channel to the dispatcher is gone
    #[error("bridge control channel closed")]
    ChannelClosed,
}

impl BridgeError {
    /// Short code for logging and stats
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Decode(e) => e.error_code(),
            BridgeError::Classify(_) => "CLASSIFY_FAILED",
            BridgeError::Aggregation(_) => "AGGREGATION_FAILED",
            BridgeError::Transport(_) => "TRANSPORT_ERROR",
            BridgeError::ChannelClosed => "CHANNEL_CLOSED",
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
