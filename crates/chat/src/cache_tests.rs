// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;
use crate::protocol::MessageKind;

fn content(n: usize) -> Message {
    Message::new(MessageKind::Content, format!("m{n}"))
}

fn payloads(cache: &MessageCache) -> Vec<String> {
    cache.to_vec().into_iter().map(|m| m.payload).collect()
}

#[test]
fn empty_cache() {
    let cache = MessageCache::default();
    assert!(cache.is_empty());
    assert_eq!(cache.capacity(), 500);
    assert!(cache.to_vec().is_empty());
}

#[test]
fn keeps_arrival_order() {
    let mut cache = MessageCache::new(8);
    for n in 0..3 {
        assert!(cache.push(content(n)));
    }
    assert_eq!(payloads(&cache), vec!["m0", "m1", "m2"]);
}

#[test]
fn evicts_oldest_past_capacity() {
    let mut cache = MessageCache::default();
    for n in 0..501 {
        cache.push(content(n));
    }
    assert_eq!(cache.len(), 500);
    let got = payloads(&cache);
    assert_eq!(got.first().map(String::as_str), Some("m1"));
    assert_eq!(got.last().map(String::as_str), Some("m500"));
}

#[test]
fn heartbeat_ack_is_rejected() {
    let mut cache = MessageCache::new(4);
    cache.push(content(0));
    assert!(!cache.push(Message::new(MessageKind::HeartbeatAck, "")));
    assert_eq!(cache.len(), 1);
}

#[test]
fn from_messages_trims_and_filters() {
    let mut input: Vec<Message> = (0..5).map(content).collect();
    input.insert(2, Message::new(MessageKind::HeartbeatAck, ""));
    let cache = MessageCache::from_messages(3, input);
    assert_eq!(payloads(&cache), vec!["m2", "m3", "m4"]);
}

#[test]
fn clear_empties() {
    let mut cache = MessageCache::new(4);
    cache.push(content(0));
    cache.clear();
    assert!(cache.is_empty());
}

fn kind_strategy() -> impl Strategy<Value = MessageKind> {
    prop_oneof![
        Just(MessageKind::Content),
        Just(MessageKind::History),
        Just(MessageKind::Status),
        Just(MessageKind::Error),
        Just(MessageKind::HeartbeatAck),
        Just(MessageKind::Trace),
    ]
}

proptest! {
    #[test]
    fn never_exceeds_capacity_and_keeps_newest(
        capacity in 1usize..40,
        kinds in proptest::collection::vec(kind_strategy(), 0..120),
    ) {
        let mut cache = MessageCache::new(capacity);
        let mut expected = Vec::new();
        for (n, kind) in kinds.iter().enumerate() {
            let msg = Message::new(*kind, format!("m{n}"));
            if kind.is_cached() {
                expected.push(msg.payload.clone());
            }
            cache.push(msg);
            prop_assert!(cache.len() <= capacity);
        }
        let keep = expected.len().saturating_sub(capacity);
        prop_assert_eq!(payloads(&cache), expected[keep..].to_vec());
    }

    #[test]
    fn heartbeat_ack_never_changes_length(prefill in 0usize..20) {
        let mut cache = MessageCache::new(10);
        for n in 0..prefill {
            cache.push(content(n));
        }
        let before = cache.len();
        cache.push(Message::new(MessageKind::HeartbeatAck, "pong"));
        prop_assert_eq!(cache.len(), before);
    }
}
