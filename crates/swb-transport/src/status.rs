//! Plain-text status page — live namespaces, rooms, sockets, and
//! time-to-expiration for idle namespaces.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::Utc;
use swb_core::{Namespace, Registry};
use tokio::time::Instant;

/// Sort key for namespace identities: `/` collates after every other byte
/// so `/chat` sorts before `/chat/inner` but after `/chat2`.
fn ident_sort_key(id: &str) -> Vec<u8> {
    id.bytes()
        .map(|b| if b == b'/' { u8::MAX } else { b })
        .collect()
}

/// Render the status listing. When the requester is not on the main host,
/// namespaces are grouped by host.
pub fn render(registry: &Registry, requester_is_main: bool) -> String {
    let mut namespaces = registry.namespaces();
    namespaces.sort_by_key(|ns| ident_sort_key(&ns.id()));

    let mut out = String::new();
    let _ = writeln!(out, "switchboard status — {}", Utc::now().to_rfc3339());
    let _ = writeln!(out, "{} namespace(s)", namespaces.len());
    let _ = writeln!(out);

    if requester_is_main {
        for ns in &namespaces {
            render_namespace(&mut out, ns, 0);
        }
    } else {
        let mut by_host: BTreeMap<String, Vec<&Arc<Namespace>>> = BTreeMap::new();
        for ns in &namespaces {
            let host = ns.host().unwrap_or("(main)").to_string();
            by_host.entry(host).or_default().push(ns);
        }
        for (host, group) in by_host {
            let _ = writeln!(out, "host: {host}");
            for ns in group {
                render_namespace(&mut out, ns, 2);
            }
        }
    }
    out
}

fn render_namespace(out: &mut String, ns: &Arc<Namespace>, indent: usize) {
    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{pad}{}", ns.id());

    let mut rooms: Vec<String> = ns
        .sockets()
        .iter()
        .flat_map(|s| s.rooms())
        .collect();
    rooms.sort();
    rooms.dedup();
    if !rooms.is_empty() {
        let _ = writeln!(out, "{pad}  rooms: {}", rooms.join(", "));
    }

    for socket in ns.sockets() {
        let addr = socket
            .remote_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(out, "{pad}  socket {} {addr}", socket.id());
    }

    if let Some(expires) = ns.expires_at() {
        let remaining = expires.saturating_duration_since(Instant::now());
        let _ = writeln!(out, "{pad}  expires in {}s", remaining.as_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use swb_core::{Client, ConnectionMeta, NsPattern, PacketSink, ServerConfig};
    use swb_protocol::Packet;

    struct NullSink;

    impl PacketSink for NullSink {
        fn deliver(&self, _packet: Packet) {}
    }

    #[test]
    fn path_separator_collates_last() {
        let mut ids = vec!["/chat/inner", "/chat2", "/chat", "/"];
        ids.sort_by_key(|id| ident_sort_key(id));
        // "/chat2" before "/chat/inner": the separator collates last.
        assert_eq!(ids, vec!["/", "/chat", "/chat2", "/chat/inner"]);
    }

    #[test]
    fn render_lists_namespaces_sorted() {
        let registry = Registry::new(ServerConfig::default());
        registry.of("/zebra").unwrap();
        registry.of("/alpha").unwrap();

        let page = render(&registry, true);
        let alpha = page.find("/alpha").unwrap();
        let zebra = page.find("/zebra").unwrap();
        assert!(alpha < zebra);
    }

    #[test]
    fn render_lists_rooms_and_sockets() {
        let registry = Registry::new(ServerConfig::default());
        let client = Client::new(
            registry.clone(),
            ConnectionMeta::default(),
            StdArc::new(NullSink),
        );
        client.request_join("/").unwrap();
        let socket = client.socket("/").unwrap();
        socket.join_room("lobby");
        socket.join_room("games");

        let page = render(&registry, true);
        assert!(page.contains("rooms: games, lobby"));
        assert!(page.contains(&format!("socket {}", socket.id())));
    }

    #[test]
    fn render_groups_by_host_for_foreign_requesters() {
        let registry = Registry::new(ServerConfig {
            host: NsPattern::Exact("a.com".into()),
            ..ServerConfig::default()
        });
        registry.register_setup(NsPattern::Any, StdArc::new(|_ns, _m| true));
        registry.get_or_create("/chat", Some("b.com"), true).unwrap();
        registry.of("/local").unwrap();

        let page = render(&registry, false);
        assert!(page.contains("host: b.com"));
        assert!(page.contains("//b.com/chat"));
        assert!(page.contains("host: (main)"));
    }
}
