// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::connection::ReadyState;
use crate::key::TabId;
use crate::test_support::{Recorded, RecordingListener};

fn key() -> ConnectionKey {
    ConnectionKey::new("ticket-1", TabId::from("tab-A"))
}

#[test]
fn chat_ws_url_http_to_ws() {
    let url = chat_ws_url("http://localhost:8080", &key());
    assert_eq!(url, "ws://localhost:8080/ws/chat/ticket-1?tab_id=tab-A");
}

#[test]
fn chat_ws_url_https_to_wss() {
    let url = chat_ws_url("https://soc.example.com/", &key());
    assert_eq!(url, "wss://soc.example.com/ws/chat/ticket-1?tab_id=tab-A");
}

#[test]
fn chat_ws_url_escapes_reserved_characters() {
    let key = ConnectionKey::new("INC 42/a?b#c", TabId::from("tab A&b=1"));
    let url = chat_ws_url("http://h", &key);
    assert_eq!(url, "ws://h/ws/chat/INC%2042%2Fa%3Fb%23c?tab_id=tab%20A%26b%3D1");
}

#[test]
fn chat_ws_url_keeps_unreserved_characters() {
    let key = ConnectionKey::new("INC-42_a.b~c", TabId::from("3f2b-9c"));
    let url = chat_ws_url("http://h", &key);
    assert_eq!(url, "ws://h/ws/chat/INC-42_a.b~c?tab_id=3f2b-9c");
}

#[tokio::test]
async fn invalid_url_reports_invalid_url_error() -> anyhow::Result<()> {
    let listener = RecordingListener::new();
    let conn = WsConnector::new(None).open("not a url", listener.clone());

    tokio::time::timeout(Duration::from_secs(5), conn.closed()).await?;
    let events = listener.events();
    assert!(
        matches!(events.first(), Some(Recorded::Error(_, detail)) if detail.starts_with("INVALID_URL")),
        "events: {events:?}"
    );
    assert_eq!(events.last(), Some(&Recorded::Close(conn.id(), CLOSE_ABNORMAL)));
    Ok(())
}

#[tokio::test]
async fn unreachable_server_reports_abnormal_close() -> anyhow::Result<()> {
    // Bind then drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let listener = RecordingListener::new();
    let conn = WsConnector::new(None).open(&format!("ws://127.0.0.1:{port}/ws"), listener.clone());

    tokio::time::timeout(Duration::from_secs(5), conn.closed()).await?;
    assert_eq!(conn.ready_state(), ReadyState::Closed);
    let events = listener.events();
    assert!(
        matches!(events.first(), Some(Recorded::Error(_, detail)) if detail.starts_with("TRANSPORT")),
        "events: {events:?}"
    );
    assert_eq!(events.last(), Some(&Recorded::Close(conn.id(), CLOSE_ABNORMAL)));
    Ok(())
}
