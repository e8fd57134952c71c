//! Namespace entity — the lifecycle-bearing object.
//!
//! A namespace is Active while it has member sockets, Idle once it empties
//! (expiration stamped), and Expired when the sweep removes it from the
//! registry. Adding a member always clears the pending expiration, even if
//! the entity was already awaiting eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use swb_protocol::Packet;
use tokio::time::Instant;

use crate::socket::{Socket, SocketId};

/// One-shot setup progress for a namespace. Setup runs at most once per
/// entity, no matter how many registrations would match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    NotStarted,
    InProgress,
    Rejected,
    Done,
}

/// A logical sub-channel identified by a path and optional host.
///
/// Owned exclusively by the registry (keyed by fully-qualified identity)
/// for its entire lifetime.
pub struct Namespace {
    name: String,
    host: Option<String>,
    /// Idle duration before eviction eligibility. `None` = kept forever.
    retirement: RwLock<Option<Duration>>,
    /// Absolute expiration time. `None` = no pending expiration.
    /// Invariant: always `None` while the member set is non-empty.
    expires_at: RwLock<Option<Instant>>,
    sockets: RwLock<HashMap<SocketId, Arc<Socket>>>,
    setup: Mutex<SetupState>,
}

impl Namespace {
    pub(crate) fn new(name: &str, host: Option<&str>, retirement: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            host: host.map(str::to_string),
            retirement: RwLock::new(retirement),
            expires_at: RwLock::new(None),
            sockets: RwLock::new(HashMap::new()),
            setup: Mutex::new(SetupState::NotStarted),
        })
    }

    /// Fully-qualified form of (host, path): `//host/path` when a host is
    /// present, else just the path.
    pub fn qualify(host: Option<&str>, name: &str) -> String {
        match host {
            Some(h) => format!("//{h}{name}"),
            None => name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Fully-qualified identity of this namespace.
    pub fn id(&self) -> String {
        Self::qualify(self.host.as_deref(), &self.name)
    }

    pub fn retirement(&self) -> Option<Duration> {
        *self.retirement.read()
    }

    /// Override the idle lifetime. Setup callbacks may call this to give a
    /// dynamically created namespace a custom (or infinite) retirement.
    pub fn set_retirement(&self, retirement: Option<Duration>) {
        *self.retirement.write() = retirement;
    }

    pub fn expires_at(&self) -> Option<Instant> {
        *self.expires_at.read()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.read().is_empty()
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.read().len()
    }

    pub fn sockets(&self) -> Vec<Arc<Socket>> {
        self.sockets.read().values().cloned().collect()
    }

    pub fn setup_state(&self) -> SetupState {
        *self.setup.lock()
    }

    /// Claim the one-shot setup slot. Returns false if setup already ran
    /// (or is running), in which case the caller must not invoke it again.
    pub(crate) fn try_begin_setup(&self) -> bool {
        let mut state = self.setup.lock();
        if *state != SetupState::NotStarted {
            return false;
        }
        *state = SetupState::InProgress;
        true
    }

    pub(crate) fn finish_setup(&self, accepted: bool) {
        *self.setup.lock() = if accepted {
            SetupState::Done
        } else {
            SetupState::Rejected
        };
    }

    /// Register a member socket. The first member re-arms the namespace:
    /// any pending expiration is cleared unconditionally.
    pub(crate) fn add_socket(&self, socket: Arc<Socket>) {
        self.sockets.write().insert(socket.id().clone(), socket);
        *self.expires_at.write() = None;
    }

    /// Remove a member socket. When the removal empties the namespace and
    /// retirement is finite, stamps the expiration and returns the
    /// retirement delay so the caller can request a scheduler wake-up.
    pub(crate) fn remove_socket(&self, id: &SocketId) -> Option<Duration> {
        {
            let mut sockets = self.sockets.write();
            sockets.remove(id)?;
            if !sockets.is_empty() {
                return None;
            }
        }
        let retirement = (*self.retirement.read())?;
        *self.expires_at.write() = Some(Instant::now() + retirement);
        Some(retirement)
    }

    /// Deliver a packet to every member socket, optionally skipping one
    /// (the sender, for event relay).
    pub fn broadcast(&self, packet: Packet, skip: Option<&SocketId>) {
        for socket in self.sockets.read().values() {
            if skip.is_some_and(|id| id == socket.id()) {
                continue;
            }
            socket.send(packet.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_with_and_without_host() {
        assert_eq!(Namespace::qualify(None, "/chat"), "/chat");
        assert_eq!(Namespace::qualify(Some("b.com"), "/chat"), "//b.com/chat");
        assert_eq!(Namespace::qualify(Some("b.com"), "/"), "//b.com/");
    }

    #[test]
    fn setup_slot_is_one_shot() {
        let ns = Namespace::new("/chat", None, None);
        assert_eq!(ns.setup_state(), SetupState::NotStarted);
        assert!(ns.try_begin_setup());
        assert_eq!(ns.setup_state(), SetupState::InProgress);
        assert!(!ns.try_begin_setup());
        ns.finish_setup(true);
        assert_eq!(ns.setup_state(), SetupState::Done);
        assert!(!ns.try_begin_setup());
    }

    #[test]
    fn setup_rejection_is_terminal() {
        let ns = Namespace::new("/chat", None, None);
        assert!(ns.try_begin_setup());
        ns.finish_setup(false);
        assert_eq!(ns.setup_state(), SetupState::Rejected);
        assert!(!ns.try_begin_setup());
    }
}
