//! Switchboard - Protocol Types
//!
//! Namespace-layer packet types for the Switchboard server. This crate is
//! the single source of truth for the packet shapes exchanged with clients;
//! framing and transport below this level are the transport crate's concern.

pub mod error;
pub mod packet;

pub use error::ProtocolError;
pub use packet::Packet;
