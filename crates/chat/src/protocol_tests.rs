// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// ── decode ────────────────────────────────────────────────────────────

#[yare::parameterized(
    content = { "content", MessageKind::Content },
    history = { "history", MessageKind::History },
    status = { "status", MessageKind::Status },
    error = { "error", MessageKind::Error },
    heartbeat_ack = { "heartbeat-ack", MessageKind::HeartbeatAck },
    trace = { "trace", MessageKind::Trace },
)]
fn decode_accepts_known_kinds(kind: &str, expected: MessageKind) {
    let text = format!(r#"{{"kind":"{kind}","payload":"hi","timestamp":1700000000.5}}"#);
    let msg = decode(&text);
    assert!(
        matches!(&msg, Ok(m) if m.kind == expected && m.payload == "hi" && m.timestamp == 1700000000.5),
        "got {msg:?}"
    );
}

#[yare::parameterized(
    not_json = { "not json", FrameError::NotJson },
    array = { "[1,2]", FrameError::NotJson },
    no_kind = { r#"{"payload":"x","timestamp":1}"#, FrameError::MissingKind },
    kind_not_string = { r#"{"kind":3,"payload":"x","timestamp":1}"#, FrameError::MissingKind },
    no_payload = { r#"{"kind":"content","timestamp":1}"#, FrameError::MissingPayload },
    payload_number = { r#"{"kind":"content","payload":5,"timestamp":1}"#, FrameError::MissingPayload },
    no_timestamp = { r#"{"kind":"content","payload":"x"}"#, FrameError::MissingTimestamp },
    timestamp_string = { r#"{"kind":"content","payload":"x","timestamp":"now"}"#, FrameError::MissingTimestamp },
)]
fn decode_rejects_invalid(text: &str, expected: FrameError) {
    assert_eq!(decode(text), Err(expected));
}

#[test]
fn decode_rejects_unknown_kind() {
    let err = decode(r#"{"kind":"typing","payload":"","timestamp":1}"#);
    assert_eq!(err, Err(FrameError::UnknownKind("typing".to_owned())));
    assert_eq!(FrameError::UnknownKind("typing".to_owned()).code(), ChatError::UnknownKind);
}

#[test]
fn decode_rejects_outbound_heartbeat_kind() {
    // `heartbeat` is client-only; servers answer with `heartbeat-ack`.
    let err = decode(r#"{"kind":"heartbeat","payload":"","timestamp":1}"#);
    assert!(matches!(err, Err(FrameError::UnknownKind(_))));
}

#[test]
fn decode_keeps_author_and_frame_id() -> anyhow::Result<()> {
    let msg = decode(
        r#"{"kind":"content","payload":"ack","author":{"id":"u1","name":"Ana"},"timestamp":12,"frame_id":"f-9"}"#,
    )?;
    assert_eq!(msg.author, Some(Author { id: "u1".to_owned(), name: "Ana".to_owned() }));
    assert_eq!(msg.frame_id.as_deref(), Some("f-9"));
    assert_eq!(msg.timestamp, 12.0);
    Ok(())
}

#[test]
fn decode_drops_malformed_author() -> anyhow::Result<()> {
    let msg = decode(r#"{"kind":"status","payload":"joined","author":{"id":"u1"},"timestamp":3}"#)?;
    assert!(msg.author.is_none());
    assert_eq!(msg.kind, MessageKind::Status);
    Ok(())
}

// ── encode ────────────────────────────────────────────────────────────

#[test]
fn encode_content_shape() -> anyhow::Result<()> {
    let text = encode_content("look at host-7")?;
    let parsed: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(parsed["kind"], "content");
    assert_eq!(parsed["payload"], "look at host-7");
    assert!(parsed["timestamp"].as_f64().is_some_and(|t| t > 0.0));
    assert_eq!(parsed.as_object().map(|o| o.len()), Some(3));
    Ok(())
}

#[test]
fn encode_heartbeat_has_empty_payload() -> anyhow::Result<()> {
    let frame: OutboundFrame = serde_json::from_str(&encode_heartbeat()?)?;
    assert_eq!(frame.kind, OutboundKind::Heartbeat);
    assert!(frame.payload.is_empty());
    Ok(())
}

// ── kinds ─────────────────────────────────────────────────────────────

#[test]
fn only_heartbeat_ack_is_uncached() {
    for kind in [
        MessageKind::Content,
        MessageKind::History,
        MessageKind::Status,
        MessageKind::Error,
        MessageKind::Trace,
    ] {
        assert!(kind.is_cached(), "{kind} should be cached");
    }
    assert!(!MessageKind::HeartbeatAck.is_cached());
}

#[test]
fn kind_serde_matches_wire_names() -> anyhow::Result<()> {
    assert_eq!(serde_json::to_string(&MessageKind::HeartbeatAck)?, r#""heartbeat-ack""#);
    assert_eq!(MessageKind::parse(MessageKind::Trace.as_str()), Some(MessageKind::Trace));
    Ok(())
}
