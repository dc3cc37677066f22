// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide store of live chat connections and their message history.
//!
//! At most one entry exists per [`ConnectionKey`]. Entries outlive the
//! controllers that created them so a remounted consumer can reattach to the
//! same socket and history. All state sits behind one mutex.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{MessageCache, DEFAULT_CAPACITY};
use crate::connection::{Connection, CLOSE_NORMAL};
use crate::key::ConnectionKey;
use crate::protocol::Message;

/// A registered connection with its cached history.
pub struct ConnectionEntry {
    pub connection: Connection,
    pub last_activity: Instant,
    pub messages: MessageCache,
}

/// Keyed registry of live connections.
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<ConnectionKey, ConnectionEntry>>,
    cache_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Registry whose per-entry message caches hold `cache_capacity` messages.
    pub fn with_capacity(cache_capacity: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), cache_capacity }
    }

    /// Return the live connection for `key`, refreshing its activity time.
    ///
    /// A closing or closed handle is evicted and `None` returned.
    pub fn get(&self, key: &ConnectionKey) -> Option<Connection> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        if entry.connection.is_closing_or_closed() {
            tracing::debug!(key = %key, "dropping closed registry entry");
            entries.remove(key);
            return None;
        }
        entry.last_activity = Instant::now();
        Some(entry.connection.clone())
    }

    /// Register `connection` under `key`, closing any live predecessor.
    ///
    /// The predecessor's cached messages carry over unless `messages` is
    /// given, in which case the cache starts from that list.
    pub fn add(&self, key: ConnectionKey, connection: Connection, messages: Option<Vec<Message>>) {
        let mut entries = self.entries.lock();
        let prior = entries.remove(&key);

        let cache = match (messages, prior.as_ref()) {
            (Some(list), _) => MessageCache::from_messages(self.cache_capacity, list),
            (None, Some(prior)) => prior.messages.clone(),
            (None, None) => MessageCache::new(self.cache_capacity),
        };

        if let Some(prior) = prior {
            if prior.connection != connection && !prior.connection.is_closing_or_closed() {
                tracing::debug!(key = %key, "replacing live connection");
                prior.connection.close(CLOSE_NORMAL, "replaced");
            }
        }

        entries.insert(
            key,
            ConnectionEntry { connection, last_activity: Instant::now(), messages: cache },
        );
    }

    /// Close and forget the connection for `key`.
    pub fn remove(&self, key: &ConnectionKey) {
        let removed = self.entries.lock().remove(key);
        if let Some(entry) = removed {
            entry.connection.close(CLOSE_NORMAL, "removed");
        }
    }

    /// Cached messages for `key`, oldest first. Empty when no entry exists.
    pub fn get_messages(&self, key: &ConnectionKey) -> Vec<Message> {
        self.entries.lock().get(key).map(|e| e.messages.to_vec()).unwrap_or_default()
    }

    /// Append a received message to the cache for `key`.
    ///
    /// Returns `false` when no entry exists or the message is a heartbeat ack.
    pub fn add_message(&self, key: &ConnectionKey, message: Message) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.last_activity = Instant::now();
        entry.messages.push(message)
    }

    pub fn clear_messages(&self, key: &ConnectionKey) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.messages.clear();
        }
    }

    /// Refresh the activity time for `key` (after a successful send).
    pub fn touch(&self, key: &ConnectionKey) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.last_activity = Instant::now();
        }
    }

    pub fn last_activity(&self, key: &ConnectionKey) -> Option<Instant> {
        self.entries.lock().get(key).map(|e| e.last_activity)
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Evict closed entries and close entries idle longer than `stale_after`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant, stale_after: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, entry| {
            if entry.connection.is_closing_or_closed() {
                tracing::debug!(key = %key, "sweeping closed connection");
                return false;
            }
            let idle = now.saturating_duration_since(entry.last_activity);
            if idle > stale_after {
                tracing::info!(key = %key, idle_secs = idle.as_secs(), "closing stale connection");
                entry.connection.close(CLOSE_NORMAL, "stale");
                return false;
            }
            true
        });
        before - entries.len()
    }

    /// Close every connection and empty the registry.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        for (key, entry) in drained {
            tracing::debug!(key = %key, "closing connection on shutdown");
            entry.connection.close(CLOSE_NORMAL, "shutdown");
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the periodic sweep over `registry`.
pub fn spawn_sweeper(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    stale_after: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let removed = registry.sweep(Instant::now(), stale_after);
            if removed > 0 {
                tracing::debug!(removed, remaining = registry.len(), "registry sweep");
            }
        }
    })
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
