//! Namespace-layer packets.
//!
//! Every packet carries `nsp`, the logical namespace path the client is
//! addressing (always beginning with `/`). Host scoping is resolved
//! server-side; clients never see fully-qualified identities.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// A packet on the namespace layer, delivered as one JSON text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Packet {
    /// Client requests to join a namespace; the server acknowledges the
    /// join by echoing the packet with `sid` set to the new socket id.
    #[serde(rename_all = "camelCase")]
    Connect {
        nsp: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sid: Option<String>,
    },

    /// A join was refused. Names the namespace so the client can react
    /// without tearing down the connection.
    #[serde(rename_all = "camelCase")]
    ConnectError { nsp: String, message: String },

    /// Client leaves a namespace.
    Disconnect { nsp: String },

    /// Application event within a namespace.
    Event { nsp: String, data: serde_json::Value },
}

impl Packet {
    /// Client-side join request (no socket id yet).
    pub fn connect(nsp: impl Into<String>) -> Self {
        Self::Connect {
            nsp: nsp.into(),
            sid: None,
        }
    }

    /// Server-side join acknowledgment carrying the assigned socket id.
    pub fn connect_ack(nsp: impl Into<String>, sid: impl Into<String>) -> Self {
        Self::Connect {
            nsp: nsp.into(),
            sid: Some(sid.into()),
        }
    }

    pub fn connect_error(nsp: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectError {
            nsp: nsp.into(),
            message: message.into(),
        }
    }

    pub fn disconnect(nsp: impl Into<String>) -> Self {
        Self::Disconnect { nsp: nsp.into() }
    }

    pub fn event(nsp: impl Into<String>, data: serde_json::Value) -> Self {
        Self::Event {
            nsp: nsp.into(),
            data,
        }
    }

    /// The namespace path this packet addresses.
    pub fn nsp(&self) -> &str {
        match self {
            Self::Connect { nsp, .. }
            | Self::ConnectError { nsp, .. }
            | Self::Disconnect { nsp }
            | Self::Event { nsp, .. } => nsp,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Parse)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}
