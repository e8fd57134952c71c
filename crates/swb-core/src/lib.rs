//! Switchboard core — dynamic namespace routing, lifecycle, and expiration.
//!
//! Namespaces are logical sub-channels on top of one multiplexed client
//! connection. This crate owns the routing of connections to namespace
//! identities, on-demand creation with an accept/reject setup protocol,
//! the active → idle → expired lifecycle, and the single coalesced sweep
//! timer that reclaims idle namespaces.
//!
//! The transport layer is decoupled from the core via the `PacketSink` trait.

pub mod client;
pub mod config;
pub mod namespace;
pub mod pattern;
pub mod registry;
mod scheduler;
pub mod socket;

/// The root namespace every connection must join first.
pub const ROOT_NAMESPACE: &str = "/";

pub use client::{Client, ClientError};
pub use config::ServerConfig;
pub use namespace::{Namespace, SetupState};
pub use pattern::{NsMatch, NsPattern};
pub use registry::{ConnectionMeta, HostResolver, Registry, SetupFn};
pub use socket::{PacketSink, Socket, SocketId};
