// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-consumer connection lifecycle: connect or adopt, heartbeat, and
//! close-driven reconnect with bounded exponential backoff.
//!
//! A controller owns its observable [`ControllerState`] but not the socket:
//! connections live in the [`ConnectionRegistry`] so they survive the
//! controller being unmounted and can be adopted by the next controller for
//! the same key.
//!
//! Lock order is controller, then registry. Listener callbacks arrive from the
//! transport with no lock held.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::MessageCache;
use crate::config::ChatConfig;
use crate::connection::{Connection, Connector, Listener, CLOSE_NORMAL};
use crate::key::ConnectionKey;
use crate::protocol::{self, Message, MessageKind};
use crate::reconnect::{ReconnectPlan, ReconnectPolicy};
use crate::registry::ConnectionRegistry;
use crate::ws::chat_ws_url;

/// Connection status as seen by one consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed-in user on whose behalf the controller connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
}

/// Timing and policy knobs for a controller.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub url: String,
    pub heartbeat_interval: Duration,
    pub connect_debounce: Duration,
    pub policy: ReconnectPolicy,
    pub cache_capacity: usize,
}

impl ControllerSettings {
    pub fn from_config(config: &ChatConfig, key: &ConnectionKey) -> Self {
        Self {
            url: chat_ws_url(&config.base_url, key),
            heartbeat_interval: config.heartbeat_interval(),
            connect_debounce: config.connect_debounce(),
            policy: config.reconnect_policy(),
            cache_capacity: config.message_cache_capacity,
        }
    }
}

struct Core {
    principal: Option<Principal>,
    connection: Option<Connection>,
    attempt: u32,
    reconnect: Option<CancellationToken>,
    /// Heartbeat task token, tagged with the connection id it serves.
    heartbeat: Option<(u64, CancellationToken)>,
    debounce: Option<CancellationToken>,
    messages: MessageCache,
}

impl Core {
    fn is_current(&self, conn: &Connection) -> bool {
        self.connection.as_ref() == Some(conn)
    }

    fn stop_heartbeat(&mut self) {
        if let Some((_, token)) = self.heartbeat.take() {
            token.cancel();
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(token) = self.reconnect.take() {
            token.cancel();
        }
    }

    fn cancel_debounce(&mut self) {
        if let Some(token) = self.debounce.take() {
            token.cancel();
        }
    }
}

struct Inner {
    key: ConnectionKey,
    settings: ControllerSettings,
    registry: Arc<ConnectionRegistry>,
    connector: Arc<dyn Connector>,
    status_tx: watch::Sender<ControllerState>,
    message_tx: broadcast::Sender<Message>,
    core: Mutex<Core>,
}

/// Drives one consumer's view of one conversation's connection.
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<Inner>,
}

impl ChatController {
    pub fn new(
        key: ConnectionKey,
        principal: Option<Principal>,
        settings: ControllerSettings,
        registry: Arc<ConnectionRegistry>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ControllerState::Disconnected);
        let (message_tx, _) = broadcast::channel(256);
        let core = Core {
            principal,
            connection: None,
            attempt: 0,
            reconnect: None,
            heartbeat: None,
            debounce: None,
            messages: MessageCache::new(settings.cache_capacity),
        };
        let inner = Inner {
            key,
            settings,
            registry,
            connector,
            status_tx,
            message_tx,
            core: Mutex::new(core),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.inner.key
    }

    pub fn status(&self) -> ControllerState {
        *self.inner.status_tx.borrow()
    }

    /// Watch status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ControllerState> {
        self.inner.status_tx.subscribe()
    }

    /// Messages shown to this consumer, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.core.lock().messages.to_vec()
    }

    /// Receive each new message as it arrives.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.inner.message_tx.subscribe()
    }

    /// Reconnect attempts made since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.inner.core.lock().attempt
    }

    pub fn reconnect_pending(&self) -> bool {
        self.inner.core.lock().reconnect.is_some()
    }

    /// Replace the signed-in principal. With `None`, `connect` does nothing.
    pub fn set_principal(&self, principal: Option<Principal>) {
        self.inner.core.lock().principal = principal;
    }

    /// Open or adopt the connection for this controller's key.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Close the connection for good and reset the retry budget.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Cancel any pending reconnect and suppress further automatic attempts.
    pub fn stop_reconnecting(&self) {
        let mut core = self.inner.core.lock();
        core.cancel_reconnect();
        core.attempt = self.inner.settings.policy.max_attempts;
        tracing::debug!(key = %self.inner.key, "automatic reconnect disabled");
    }

    /// Send a chat message. Returns `false` unless connected; the result
    /// reports hand-off to the transport, not delivery.
    pub fn send_message(&self, text: &str) -> bool {
        self.inner.send_message(text)
    }

    /// Forget displayed and cached history without touching the connection.
    pub fn clear_messages(&self) {
        let mut core = self.inner.core.lock();
        core.messages.clear();
        self.inner.registry.clear_messages(&self.inner.key);
    }

    /// Connectivity came back: reconnect now if nothing else will.
    pub fn network_online(&self) {
        let should_connect = {
            let core = self.inner.core.lock();
            self.status() == ControllerState::Disconnected
                && core.reconnect.is_none()
                && !self.inner.settings.policy.is_exhausted(core.attempt)
        };
        if should_connect {
            tracing::info!(key = %self.inner.key, "network online, reconnecting");
            self.inner.connect();
        }
    }

    /// Consumer appeared: connect after a short debounce.
    pub fn mount(&self) {
        let mut core = self.inner.core.lock();
        core.cancel_debounce();
        let token = CancellationToken::new();
        core.debounce = Some(token.clone());

        let inner = Arc::clone(&self.inner);
        let delay = inner.settings.connect_debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                let mut core = inner.core.lock();
                if token.is_cancelled() {
                    return;
                }
                core.debounce = None;
            }
            inner.connect();
        });
    }

    /// Consumer went away. Only a pending initial connect is cancelled; an
    /// established connection stays in the registry for the next mount.
    pub fn unmount(&self) {
        self.inner.core.lock().cancel_debounce();
    }
}

impl Inner {
    fn listener(self: &Arc<Self>) -> Arc<dyn Listener> {
        Arc::new(ControllerListener { inner: Arc::clone(self) })
    }

    fn set_status(&self, state: ControllerState) {
        self.status_tx.send_replace(state);
    }

    fn connect(self: &Arc<Self>) {
        let mut core = self.core.lock();
        if core.principal.is_none() || self.key.conversation_id.is_empty() {
            tracing::debug!(key = %self.key, "connect skipped, no identity");
            return;
        }

        let cached = self.registry.get_messages(&self.key);
        if let Some(existing) = self.registry.get(&self.key) {
            if core.is_current(&existing) {
                return;
            }
            self.adopt(&mut core, existing);
            return;
        }

        if let Some(conn) = &core.connection {
            if !conn.is_closing_or_closed() {
                return;
            }
        }

        self.set_status(ControllerState::Connecting);
        tracing::info!(key = %self.key, attempt = core.attempt, "opening chat connection");
        let conn = self.connector.open(&self.settings.url, self.listener());
        core.connection = Some(conn.clone());

        let carry = if core.messages.is_empty() { cached } else { core.messages.to_vec() };
        self.registry.add(self.key.clone(), conn, Some(carry));
        core.messages =
            MessageCache::from_messages(self.settings.cache_capacity, self.registry.get_messages(&self.key));
    }

    /// Take over a registered connection, installing this controller's listener.
    fn adopt(self: &Arc<Self>, core: &mut Core, conn: Connection) {
        conn.set_listener(self.listener());
        core.connection = Some(conn.clone());
        core.messages =
            MessageCache::from_messages(self.settings.cache_capacity, self.registry.get_messages(&self.key));

        if conn.is_open() {
            core.attempt = 0;
            self.start_heartbeat(core, &conn);
            self.set_status(ControllerState::Connected);
        } else {
            self.set_status(ControllerState::Connecting);
        }
        tracing::info!(key = %self.key, conn = conn.id(), "adopted existing chat connection");
    }

    fn disconnect(&self) {
        let mut core = self.core.lock();
        core.cancel_reconnect();
        core.cancel_debounce();
        core.stop_heartbeat();
        core.attempt = 0;
        let conn = core.connection.take();
        self.registry.remove(&self.key);
        if let Some(conn) = conn {
            conn.close(CLOSE_NORMAL, "disconnect");
        }
        self.set_status(ControllerState::Disconnected);
        tracing::info!(key = %self.key, "chat disconnected");
    }

    fn send_message(&self, text: &str) -> bool {
        let conn = {
            let core = self.core.lock();
            match core.connection.clone() {
                Some(conn) if conn.is_open() && *self.status_tx.borrow() == ControllerState::Connected => {
                    conn
                }
                _ => {
                    tracing::warn!(key = %self.key, "cannot send, chat not connected");
                    return false;
                }
            }
        };

        let frame = match protocol::encode_content(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(key = %self.key, err = %e, "failed to encode chat message");
                return false;
            }
        };
        match conn.send(frame) {
            Ok(()) => {
                self.registry.touch(&self.key);
                true
            }
            Err(e) => {
                tracing::warn!(key = %self.key, err = %e, "chat send failed");
                false
            }
        }
    }

    /// Start the heartbeat for `conn` unless one is already running on it.
    fn start_heartbeat(&self, core: &mut Core, conn: &Connection) {
        if matches!(&core.heartbeat, Some((id, _)) if *id == conn.id()) {
            return;
        }
        core.stop_heartbeat();
        if !conn.claim_heartbeat() {
            tracing::debug!(key = %self.key, "heartbeat already running on adopted connection");
            return;
        }

        let token = CancellationToken::new();
        core.heartbeat = Some((conn.id(), token.clone()));
        let conn = conn.clone();
        let key = self.key.clone();
        let interval = self.settings.heartbeat_interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = conn.closed() => break,
                    _ = timer.tick() => {}
                }

                if !conn.is_open() {
                    tracing::debug!(key = %key, "skipping heartbeat, socket not open");
                    continue;
                }
                match protocol::encode_heartbeat().and_then(|frame| conn.send(frame)) {
                    Ok(()) => tracing::trace!(key = %key, "heartbeat sent"),
                    Err(e) => tracing::debug!(key = %key, err = %e, "heartbeat send failed"),
                }
            }
            conn.release_heartbeat();
        });
    }

    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core, delay: Duration) {
        core.cancel_reconnect();
        let token = CancellationToken::new();
        core.reconnect = Some(token.clone());
        tracing::info!(
            key = %self.key,
            attempt = core.attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling chat reconnect"
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                let mut core = inner.core.lock();
                if token.is_cancelled() {
                    return;
                }
                core.reconnect = None;
                core.attempt += 1;
            }
            inner.connect();
        });
    }

    fn handle_open(self: &Arc<Self>, conn: &Connection) {
        let mut core = self.core.lock();
        if !core.is_current(conn) {
            return;
        }
        core.attempt = 0;
        self.start_heartbeat(&mut core, conn);
        self.set_status(ControllerState::Connected);
        tracing::info!(key = %self.key, conn = conn.id(), "chat connected");
    }

    fn handle_message(&self, conn: &Connection, text: &str) {
        let mut core = self.core.lock();
        if !core.is_current(conn) {
            return;
        }
        // Any inbound frame counts as activity, heartbeat-acks included.
        self.registry.touch(&self.key);

        let msg = match protocol::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(key = %self.key, err = %e, code = %e.code(), "discarding chat frame");
                return;
            }
        };
        if msg.kind == MessageKind::HeartbeatAck {
            tracing::trace!(key = %self.key, "heartbeat acknowledged");
            return;
        }

        self.registry.add_message(&self.key, msg.clone());
        core.messages.push(msg.clone());
        // No subscribers is fine; the message is still in `messages()`.
        let _ = self.message_tx.send(msg);
    }

    fn handle_error(&self, conn: &Connection, detail: &str) {
        let core = self.core.lock();
        if !core.is_current(conn) {
            return;
        }
        tracing::debug!(key = %self.key, err = detail, "chat transport error");
        self.set_status(ControllerState::Error);
    }

    fn handle_close(self: &Arc<Self>, conn: &Connection, code: u16) {
        let mut core = self.core.lock();
        if !core.is_current(conn) {
            return;
        }
        core.connection = None;
        core.stop_heartbeat();
        self.set_status(ControllerState::Disconnected);

        match self.settings.policy.plan(code, core.attempt) {
            ReconnectPlan::Stop => {
                tracing::info!(key = %self.key, code, "chat connection closed");
            }
            ReconnectPlan::Exhausted => {
                tracing::warn!(
                    key = %self.key,
                    code,
                    attempt = core.attempt,
                    "chat reconnect budget exhausted"
                );
            }
            ReconnectPlan::Retry(delay) => self.schedule_reconnect(&mut core, delay),
        }
    }
}

/// Routes socket events to the controller that currently owns the socket.
struct ControllerListener {
    inner: Arc<Inner>,
}

impl Listener for ControllerListener {
    fn on_open(&self, conn: &Connection) {
        self.inner.handle_open(conn);
    }

    fn on_message(&self, conn: &Connection, text: &str) {
        self.inner.handle_message(conn, text);
    }

    fn on_error(&self, conn: &Connection, detail: &str) {
        self.inner.handle_error(conn, detail);
    }

    fn on_close(&self, conn: &Connection, code: u16) {
        self.inner.handle_close(conn, code);
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
