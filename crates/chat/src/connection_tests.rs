// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{Recorded, RecordingListener};

#[yare::parameterized(
    normal = { 1000, true, false },
    going_away = { 1001, true, false },
    protocol_error = { 1002, false, false },
    no_status = { 1005, false, true },
    abnormal = { 1006, false, true },
    internal = { 1011, false, false },
    app_defined = { 4000, false, false },
)]
fn close_code_classes(code: u16, normal: bool, abnormal: bool) {
    assert_eq!(is_normal_close(code), normal);
    assert_eq!(is_abnormal_close(code), abnormal);
}

#[test]
fn lifecycle_events_reach_listener() {
    let (conn, _rx) = Connection::new("ws://x/ws/chat/t1?tab_id=a");
    let listener = RecordingListener::new();
    conn.set_listener(listener.clone());

    assert_eq!(conn.ready_state(), ReadyState::Connecting);
    conn.deliver_open();
    assert!(conn.is_open());
    conn.deliver_message("hello");
    conn.deliver_error("reset");
    conn.deliver_close(1006);

    let id = conn.id();
    assert_eq!(
        listener.events(),
        vec![
            Recorded::Open(id),
            Recorded::Message(id, "hello".to_owned()),
            Recorded::Error(id, "reset".to_owned()),
            Recorded::Close(id, 1006),
        ]
    );
}

#[test]
fn close_is_delivered_once_and_releases_listener() {
    let (conn, _rx) = Connection::new("ws://x");
    let listener = RecordingListener::new();
    conn.set_listener(listener.clone());
    conn.deliver_open();
    conn.deliver_close(1000);
    conn.deliver_close(1006);
    conn.deliver_message("late");

    assert_eq!(listener.events().len(), 2);
    assert_eq!(conn.ready_state(), ReadyState::Closed);
}

#[test]
fn send_requires_open() {
    let (conn, mut rx) = Connection::new("ws://x");
    assert_eq!(conn.send("a".to_owned()), Err(ChatError::NotOpen));

    conn.deliver_open();
    assert_eq!(conn.send("b".to_owned()), Ok(()));
    assert_eq!(rx.try_recv().ok(), Some(Outbound::Text("b".to_owned())));

    conn.close(CLOSE_NORMAL, "bye");
    assert_eq!(conn.send("c".to_owned()), Err(ChatError::Closed));
}

#[test]
fn close_queues_once_and_marks_closing() {
    let (conn, mut rx) = Connection::new("ws://x");
    conn.deliver_open();
    conn.close(CLOSE_NORMAL, "done");
    conn.close(CLOSE_NORMAL, "again");

    assert_eq!(conn.ready_state(), ReadyState::Closing);
    assert!(conn.is_closing_or_closed());
    assert_eq!(
        rx.try_recv().ok(),
        Some(Outbound::Close { code: CLOSE_NORMAL, reason: "done".to_owned() })
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn open_after_close_request_is_ignored() {
    let (conn, _rx) = Connection::new("ws://x");
    let listener = RecordingListener::new();
    conn.set_listener(listener.clone());
    conn.close(CLOSE_NORMAL, "cancelled");
    conn.deliver_open();

    assert_eq!(conn.ready_state(), ReadyState::Closing);
    assert!(listener.events().is_empty());
}

#[test]
fn set_listener_swaps() {
    let (conn, _rx) = Connection::new("ws://x");
    let first = RecordingListener::new();
    let second = RecordingListener::new();
    assert!(conn.set_listener(first.clone()).is_none());
    assert!(conn.set_listener(second.clone()).is_some());

    conn.deliver_open();
    assert!(first.events().is_empty());
    assert_eq!(second.events(), vec![Recorded::Open(conn.id())]);
}

#[test]
fn heartbeat_slot_is_exclusive() {
    let (conn, _rx) = Connection::new("ws://x");
    assert!(conn.claim_heartbeat());
    assert!(!conn.claim_heartbeat());
    conn.release_heartbeat();
    assert!(conn.claim_heartbeat());
}

#[test]
fn handles_compare_by_identity() {
    let (a, _ra) = Connection::new("ws://x");
    let (b, _rb) = Connection::new("ws://x");
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
    assert_ne!(a.id(), b.id());
}

#[tokio::test]
async fn closed_resolves_after_close() {
    let (conn, _rx) = Connection::new("ws://x");
    let waiter = conn.clone();
    let task = tokio::spawn(async move { waiter.closed().await });
    conn.deliver_close(1000);
    assert!(tokio::time::timeout(std::time::Duration::from_secs(1), task).await.is_ok());
}
