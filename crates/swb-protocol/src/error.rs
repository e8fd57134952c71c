//! Protocol-level errors.

use thiserror::Error;

/// Errors produced while encoding or decoding namespace-layer packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to parse packet: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to encode packet: {0}")]
    Encode(#[source] serde_json::Error),
}
