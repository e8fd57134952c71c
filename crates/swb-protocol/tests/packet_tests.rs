//! Protocol layer tests — packet serialization and wire-format shapes.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use swb_protocol::Packet;

    // ─────────────────────────────────────────────────────────────────────
    // Connect
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn connect_request_serialization() {
        let pkt = Packet::connect("/chat");
        let wire = pkt.encode().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed["type"], "connect");
        assert_eq!(parsed["nsp"], "/chat");
        // sid is absent until the server acknowledges
        assert!(parsed.get("sid").is_none());
    }

    #[test]
    fn connect_ack_carries_sid() {
        let pkt = Packet::connect_ack("/chat", "sock-1");
        let wire = pkt.encode().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed["type"], "connect");
        assert_eq!(parsed["sid"], "sock-1");
    }

    #[test]
    fn connect_deserialized_from_wire_format() {
        // This is exactly what a client sends to join a namespace
        let wire = r#"{"type":"connect","nsp":"/admin"}"#;
        let pkt = Packet::decode(wire).unwrap();
        assert_eq!(pkt, Packet::connect("/admin"));
        assert_eq!(pkt.nsp(), "/admin");
    }

    // ─────────────────────────────────────────────────────────────────────
    // ConnectError
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn connect_error_serialization() {
        let pkt = Packet::connect_error("/nope", "invalid namespace");
        let wire = pkt.encode().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed["type"], "connectError");
        assert_eq!(parsed["nsp"], "/nope");
        assert_eq!(parsed["message"], "invalid namespace");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Disconnect / Event
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn disconnect_roundtrip() {
        let pkt = Packet::disconnect("/chat");
        let wire = pkt.encode().unwrap();
        let parsed = Packet::decode(&wire).unwrap();
        assert_eq!(parsed, pkt);
    }

    #[test]
    fn event_roundtrip() {
        let pkt = Packet::event("/chat", json!({"msg": "hello", "seq": 3}));
        let wire = pkt.encode().unwrap();
        let parsed = Packet::decode(&wire).unwrap();
        assert_eq!(parsed, pkt);
        match parsed {
            Packet::Event { nsp, data } => {
                assert_eq!(nsp, "/chat");
                assert_eq!(data["msg"], "hello");
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn event_deserialized_from_wire_format() {
        let wire = r#"{"type":"event","nsp":"/","data":{"tick":1}}"#;
        let pkt = Packet::decode(wire).unwrap();
        assert_eq!(pkt.nsp(), "/");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Malformed input
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(Packet::decode("not json").is_err());
    }

    #[test]
    fn decode_rejects_unknown_type() {
        assert!(Packet::decode(r#"{"type":"teleport","nsp":"/"}"#).is_err());
    }

    #[test]
    fn decode_rejects_missing_nsp() {
        assert!(Packet::decode(r#"{"type":"connect"}"#).is_err());
    }
}
