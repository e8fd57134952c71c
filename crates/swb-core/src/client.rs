//! Client connection sequencer — orders namespace joins per connection.
//!
//! Every connection must establish the root namespace (`/`) before any
//! other join becomes observable. Non-root joins arriving earlier are
//! routed immediately (so invalid namespaces fail fast) but their
//! membership is buffered and replayed in FIFO order once root completes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use swb_protocol::Packet;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ROOT_NAMESPACE;
use crate::namespace::Namespace;
use crate::registry::{ConnectionMeta, Registry};
use crate::socket::{PacketSink, Socket};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Auto-creation was requested for an identity with no matching setup
    /// (or setup rejected it). Surfaced to the client as a CONNECT_ERROR
    /// packet; the connection itself stays up.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
}

struct ClientState {
    root_joined: bool,
    /// FIFO buffer of join requests deferred until root completes.
    buffered: Vec<String>,
    /// Active memberships, keyed by fully-qualified namespace identity.
    sockets: HashMap<String, Arc<Socket>>,
}

/// Per-connection sequencing state. Wraps the delivery handle for the
/// underlying connection; the host component is resolved once at
/// construction and applies to every join on this connection.
pub struct Client {
    id: String,
    registry: Arc<Registry>,
    host: Option<String>,
    meta: ConnectionMeta,
    sink: Arc<dyn PacketSink>,
    state: Mutex<ClientState>,
}

impl Client {
    pub fn new(registry: Arc<Registry>, meta: ConnectionMeta, sink: Arc<dyn PacketSink>) -> Self {
        let host = registry.resolve_host(&meta);
        debug!(host = ?host, "connection host resolved");
        Self {
            id: Uuid::new_v4().to_string(),
            registry,
            host,
            meta,
            sink,
            state: Mutex::new(ClientState {
                root_joined: false,
                buffered: Vec::new(),
                sockets: HashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Host component applied to this connection's namespaces
    /// (`None` = main host).
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Join `name`. Routing happens immediately; membership in a non-root
    /// namespace is deferred until the root join completes, then replayed
    /// in original order.
    pub fn request_join(&self, name: &str) -> Result<(), ClientError> {
        let Some(ns) = self.registry.get_or_create(name, self.host.as_deref(), true) else {
            warn!(client = %self.id, namespace = name, "join refused: invalid namespace");
            self.sink.deliver(Packet::connect_error(name, "invalid namespace"));
            return Err(ClientError::InvalidNamespace(name.to_string()));
        };

        {
            let mut state = self.state.lock();
            if name != ROOT_NAMESPACE && !state.root_joined {
                debug!(client = %self.id, namespace = name, "join deferred until root connects");
                state.buffered.push(name.to_string());
                return Ok(());
            }
        }

        self.join_now(&ns);

        if name == ROOT_NAMESPACE {
            let pending = {
                let mut state = self.state.lock();
                state.root_joined = true;
                std::mem::take(&mut state.buffered)
            };
            for deferred in pending {
                // Already routed once when buffered; this is a lookup.
                match self.registry.get_or_create(&deferred, self.host.as_deref(), true) {
                    Some(ns) => self.join_now(&ns),
                    None => {
                        self.sink
                            .deliver(Packet::connect_error(&deferred, "invalid namespace"));
                    }
                }
            }
        }
        Ok(())
    }

    fn join_now(&self, ns: &Arc<Namespace>) {
        let id = ns.id();
        let socket = {
            let mut state = self.state.lock();
            if state.sockets.contains_key(&id) {
                // Duplicate CONNECT: keep the existing membership.
                return;
            }
            let socket = Socket::new(id.clone(), self.meta.remote_addr, self.sink.clone());
            state.sockets.insert(id.clone(), socket.clone());
            socket
        };
        ns.add_socket(socket.clone());
        info!(client = %self.id, namespace = %id, socket = %socket.id(), "socket joined namespace");
        self.sink
            .deliver(Packet::connect_ack(ns.name(), socket.id().as_str()));
    }

    /// Leave one namespace (client-initiated disconnect packet). A join
    /// still sitting in the pre-root buffer is withdrawn so the replay
    /// does not re-join it.
    pub fn leave(&self, name: &str) {
        let id = Namespace::qualify(self.host.as_deref(), name);
        let socket = {
            let mut state = self.state.lock();
            state.buffered.retain(|buffered| buffered != name);
            state.sockets.remove(&id)
        };
        if let Some(socket) = socket {
            self.registry.leave(&id, socket.id());
        }
    }

    /// The connection closed: release every membership and drop any
    /// buffered joins.
    pub fn close(&self) {
        let sockets: Vec<(String, Arc<Socket>)> = {
            let mut state = self.state.lock();
            state.buffered.clear();
            state.sockets.drain().collect()
        };
        for (id, socket) in sockets {
            self.registry.leave(&id, socket.id());
        }
    }

    /// This connection's socket in the namespace named `name`, if joined.
    pub fn socket(&self, name: &str) -> Option<Arc<Socket>> {
        let id = Namespace::qualify(self.host.as_deref(), name);
        self.state.lock().sockets.get(&id).cloned()
    }

    /// Relay an application event to the other members of a namespace this
    /// connection has joined. Events for namespaces the connection never
    /// joined are dropped.
    pub fn forward_event(&self, name: &str, data: serde_json::Value) {
        let id = Namespace::qualify(self.host.as_deref(), name);
        let socket = match self.state.lock().sockets.get(&id) {
            Some(s) => s.clone(),
            None => return,
        };
        if let Some(ns) = self.registry.get(&id) {
            ns.broadcast(Packet::event(name, data), Some(socket.id()));
        }
    }
}
