//! Switchboard Transport Layer
//!
//! WebSocket transport for the namespace server. The transport handles:
//! - Connection lifecycle (upgrade, message loop, close)
//! - Host header extraction for namespace routing
//! - Packet parse/dispatch to the per-connection sequencer
//! - The health endpoint and the optional plain-text status page
//!
//! The transport is decoupled from the core via the `PacketSink` trait.

pub mod server;
pub mod status;

pub use server::{TransportConfig, TransportServer};
