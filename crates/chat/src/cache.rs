// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;

use crate::protocol::Message;

/// Default number of messages retained per connection.
pub const DEFAULT_CAPACITY: usize = 500;

/// Bounded FIFO of received messages for one connection key.
///
/// Newest messages are at the back. Pushing past capacity drops from the
/// front. Heartbeat acknowledgements are never stored.
#[derive(Debug, Clone)]
pub struct MessageCache {
    buf: VecDeque<Message>,
    capacity: usize,
}

impl MessageCache {
    pub fn new(capacity: usize) -> Self {
        Self { buf: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)), capacity }
    }

    /// Build a cache from an existing ordered list, keeping only the newest
    /// `capacity` cacheable messages.
    pub fn from_messages(capacity: usize, messages: Vec<Message>) -> Self {
        let mut cache = Self::new(capacity);
        for msg in messages {
            cache.push(msg);
        }
        cache
    }

    /// Append a message. Returns `false` if the message kind is not cacheable.
    pub fn push(&mut self, msg: Message) -> bool {
        if !msg.kind.is_cached() || self.capacity == 0 {
            return false;
        }
        self.buf.push_back(msg);
        while self.buf.len() > self.capacity {
            self.buf.pop_front();
        }
        true
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot in arrival order (oldest first).
    pub fn to_vec(&self) -> Vec<Message> {
        self.buf.iter().cloned().collect()
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
