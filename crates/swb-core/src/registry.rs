//! Namespace registry & router.
//!
//! Owns the mapping from fully-qualified identity to namespace entity,
//! resolves the host component per connection, performs on-demand creation
//! with setup dispatch, and sweeps expired idle namespaces.
//!
//! Uses parking_lot locks (sync) around the maps so routing can be called
//! from both sync and async contexts. Setup callbacks run outside the map
//! lock; they are synchronous and expected to return promptly.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ROOT_NAMESPACE;
use crate::config::ServerConfig;
use crate::namespace::Namespace;
use crate::pattern::{NsMatch, NsPattern};
use crate::scheduler::ExpirationScheduler;
use crate::socket::SocketId;

/// Metadata the transport hands over for each new connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMeta {
    /// Raw host header, if the client sent one.
    pub host: Option<String>,
    pub remote_addr: Option<SocketAddr>,
}

/// Setup callback: accept (true) or reject (false) a freshly routed
/// namespace. Receives the entity and the match metadata that selected
/// this registration.
pub type SetupFn = Arc<dyn Fn(&Arc<Namespace>, &NsMatch) -> bool + Send + Sync>;

/// Replaceable hook mapping connection metadata to a host component
/// (`None` = main host).
pub type HostResolver = Arc<dyn Fn(&ConnectionMeta) -> Option<String> + Send + Sync>;

struct PatternSetup {
    pattern: NsPattern,
    callback: SetupFn,
}

/// Owns every namespace entity, keyed by fully-qualified identity.
pub struct Registry {
    config: ServerConfig,
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
    /// Exact-name registrations; these always win over patterns.
    exact_setups: RwLock<HashMap<String, SetupFn>>,
    /// Pattern registrations, most recently registered last.
    pattern_setups: RwLock<Vec<PatternSetup>>,
    host_resolver: RwLock<Option<HostResolver>>,
    /// Serializes setup-table publication against the lookup+insert window
    /// of creation, so a registration and a concurrent creator can never
    /// miss each other. Setup callbacks run outside this lock.
    route_lock: Mutex<()>,
    scheduler: ExpirationScheduler,
}

impl Registry {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Registry>| Self {
            config,
            namespaces: RwLock::new(HashMap::new()),
            exact_setups: RwLock::new(HashMap::new()),
            pattern_setups: RwLock::new(Vec::new()),
            host_resolver: RwLock::new(None),
            route_lock: Mutex::new(()),
            scheduler: ExpirationScheduler::new(weak.clone()),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Resolve the host component for a connection. A header matching the
    /// configured host policy (or a missing header) resolves to the main
    /// host (`None`); anything else becomes the namespace's host verbatim.
    pub fn resolve_host(&self, meta: &ConnectionMeta) -> Option<String> {
        if let Some(custom) = self.host_resolver.read().clone() {
            return custom(meta);
        }
        let header = meta.host.as_deref()?;
        if self.config.host.matches(header).is_some() {
            None
        } else {
            Some(header.to_string())
        }
    }

    /// Replace the default host resolution policy.
    pub fn set_host_resolver(&self, resolver: HostResolver) {
        *self.host_resolver.write() = Some(resolver);
    }

    /// Register a setup handler for an exact identity or a pattern.
    ///
    /// The registration is applied immediately to any existing entity whose
    /// identity matches and whose setup never ran. Rejection on this path
    /// leaves the entity in place: it was admitted before the registration
    /// existed. (Creation-time rejection removes the entity instead; the
    /// asymmetry is deliberate, see DESIGN.md.)
    pub fn register_setup(&self, pattern: NsPattern, callback: SetupFn) {
        // Publish the registration and snapshot existing entities under the
        // route lock: an entity created concurrently either lands in this
        // snapshot or sees the registration in its own lookup. Without the
        // lock it could miss both and stay NotStarted forever.
        let retroactive: Vec<(Arc<Namespace>, NsMatch)> = {
            let _route = self.route_lock.lock();

            match &pattern {
                NsPattern::Exact(name) => {
                    debug!(name = %name, "registered exact namespace setup");
                    self.exact_setups.write().insert(name.clone(), callback.clone());
                }
                other => {
                    debug!(pattern = ?other, "registered namespace setup pattern");
                    self.pattern_setups.write().push(PatternSetup {
                        pattern: pattern.clone(),
                        callback: callback.clone(),
                    });
                }
            }

            let map = self.namespaces.read();
            map.iter()
                .filter_map(|(id, ns)| pattern.matches(id).map(|m| (ns.clone(), m)))
                .collect()
        };

        for (ns, m) in retroactive {
            if !ns.try_begin_setup() {
                continue;
            }
            let accepted = invoke_setup(&callback, &ns, &m);
            ns.finish_setup(accepted);
            if !accepted {
                warn!(namespace = %ns.id(), "retroactive setup rejected namespace; entity kept");
            }
        }
    }

    /// Look up or create the namespace at (name, host).
    ///
    /// Automatic creation (a client tried to connect) requires a matching
    /// setup registration unless the target is the root namespace; static
    /// requests are created unconditionally with infinite retirement.
    /// First writer wins: a concurrent creator for the same identity
    /// degrades to a lookup.
    pub fn get_or_create(
        &self,
        name: &str,
        host: Option<&str>,
        is_automatic: bool,
    ) -> Option<Arc<Namespace>> {
        let id = Namespace::qualify(host, name);
        if let Some(existing) = self.namespaces.read().get(&id) {
            return Some(existing.clone());
        }

        // Publish before running setup so callbacks that inspect the
        // registry mid-setup observe the entity. The route lock covers the
        // lookup+insert window: a racing creator for the same identity
        // degrades to a lookup, and a racing registration is either seen
        // here or sees this entity in its retroactive snapshot.
        let (ns, registration) = {
            let _route = self.route_lock.lock();
            if let Some(existing) = self.namespaces.read().get(&id) {
                return Some(existing.clone());
            }

            let registration = self.lookup_setup(&id);
            if registration.is_none() && is_automatic && name != ROOT_NAMESPACE {
                debug!(namespace = %id, "no setup matches auto-created namespace");
                return None;
            }

            let retirement = if is_automatic {
                Some(self.config.retirement)
            } else {
                None
            };
            let ns = Namespace::new(name, host, retirement);
            self.namespaces.write().insert(id.clone(), ns.clone());
            (ns, registration)
        };
        info!(namespace = %id, automatic = is_automatic, "namespace created");

        if let Some((callback, m)) = registration {
            // A retroactive pass racing this creation may have claimed the
            // setup slot already; the one-shot state keeps it single-run.
            if ns.try_begin_setup() {
                let accepted = invoke_setup(&callback, &ns, &m);
                ns.finish_setup(accepted);
                if !accepted {
                    self.namespaces.write().remove(&id);
                    info!(namespace = %id, "setup rejected namespace");
                    return None;
                }
            }
        }
        Some(ns)
    }

    /// Namespace lookup/creation mirroring the underlying protocol's call:
    /// creates the namespace unconditionally on the main host.
    pub fn of(&self, name: &str) -> Option<Arc<Namespace>> {
        self.get_or_create(name, None, false)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Namespace>> {
        self.namespaces.read().get(id).cloned()
    }

    /// Snapshot of all live namespaces.
    pub fn namespaces(&self) -> Vec<Arc<Namespace>> {
        self.namespaces.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.namespaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.read().is_empty()
    }

    /// Remove a socket from a namespace. When the removal empties the
    /// entity, asks the scheduler for a wake-up no later than the entity's
    /// retirement from now.
    pub fn leave(&self, nsp_id: &str, socket: &SocketId) {
        let ns = self.get(nsp_id);
        if let Some(ns) = ns {
            if let Some(retirement) = ns.remove_socket(socket) {
                debug!(
                    namespace = %nsp_id,
                    retirement_ms = retirement.as_millis() as u64,
                    "namespace idle, expiration stamped"
                );
                self.scheduler.request_wake_by(Some(retirement));
            }
        }
    }

    /// Full expiration pass: evict every idle namespace whose expiration
    /// has passed, then re-arm the scheduler for the earliest remaining
    /// expiration (or not at all if none is pending).
    pub fn sweep(&self) {
        self.scheduler.clear();
        let now = Instant::now();
        let mut next: Option<Instant> = None;
        let mut evicted: Vec<String> = Vec::new();
        {
            let mut map = self.namespaces.write();
            map.retain(|id, ns| match ns.expires_at() {
                // Still-idle and past due: evict. An entity that regained
                // members since its expiration was stamped has reverted to
                // active (expiration cleared) and is skipped.
                Some(t) if t <= now && ns.is_empty() => {
                    evicted.push(id.clone());
                    false
                }
                Some(t) => {
                    next = Some(next.map_or(t, |n| n.min(t)));
                    true
                }
                None => true,
            });
        }
        for id in &evicted {
            info!(namespace = %id, "evicted expired namespace");
        }
        if let Some(t) = next {
            self.scheduler.request_wake_by(Some(t.saturating_duration_since(now)));
        }
    }

    /// Whether a sweep timer is currently armed.
    pub fn has_pending_sweep(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Exact registrations win over patterns regardless of registration
    /// order; among patterns the most recently registered match wins.
    fn lookup_setup(&self, id: &str) -> Option<(SetupFn, NsMatch)> {
        if let Some(callback) = self.exact_setups.read().get(id) {
            return Some((callback.clone(), NsMatch::whole(id)));
        }
        let patterns = self.pattern_setups.read();
        for entry in patterns.iter().rev() {
            if let Some(m) = entry.pattern.matches(id) {
                return Some((entry.callback.clone(), m));
            }
        }
        None
    }
}

/// Run a setup callback, containing panics: a panicking callback counts as
/// rejection so the entity never stays permanently in progress.
fn invoke_setup(callback: &SetupFn, ns: &Arc<Namespace>, m: &NsMatch) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(ns, m))) {
        Ok(accepted) => accepted,
        Err(_) => {
            warn!(namespace = %ns.id(), "setup callback panicked; rejecting namespace");
            false
        }
    }
}
