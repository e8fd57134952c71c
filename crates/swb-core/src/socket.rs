//! Socket — one client's membership in one namespace.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use swb_protocol::Packet;
use uuid::Uuid;

/// Narrow delivery primitive: push a packet toward one client connection.
///
/// The transport implements this over its outgoing channel; tests implement
/// it with a capturing buffer.
pub trait PacketSink: Send + Sync + 'static {
    fn deliver(&self, packet: Packet);
}

/// Opaque socket identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketId(String);

impl SocketId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client's presence inside a single namespace. Holds room membership and
/// the delivery handle back to the owning connection.
pub struct Socket {
    id: SocketId,
    /// Fully-qualified identity of the owning namespace.
    nsp: String,
    remote_addr: Option<SocketAddr>,
    rooms: RwLock<HashSet<String>>,
    sink: Arc<dyn PacketSink>,
}

impl Socket {
    pub(crate) fn new(
        nsp: String,
        remote_addr: Option<SocketAddr>,
        sink: Arc<dyn PacketSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SocketId::generate(),
            nsp,
            remote_addr,
            rooms: RwLock::new(HashSet::new()),
            sink,
        })
    }

    pub fn id(&self) -> &SocketId {
        &self.id
    }

    /// Fully-qualified identity of the namespace this socket belongs to.
    pub fn nsp(&self) -> &str {
        &self.nsp
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn join_room(&self, room: &str) {
        self.rooms.write().insert(room.to_string());
    }

    pub fn leave_room(&self, room: &str) {
        self.rooms.write().remove(room);
    }

    pub fn rooms(&self) -> Vec<String> {
        self.rooms.read().iter().cloned().collect()
    }

    /// Deliver a packet to the client behind this socket.
    pub fn send(&self, packet: Packet) {
        self.sink.deliver(packet);
    }
}
