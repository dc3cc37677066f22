// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-neutral connection handle.
//!
//! A [`Connection`] is a cheap clonable handle shared by the registry, the
//! controller that owns it, and the transport driver behind it. The driver
//! reports socket events through the `deliver_*` methods, which update the
//! ready state and forward to the currently installed [`Listener`]. Outbound
//! traffic is queued on an unbounded channel the driver drains.
//!
//! Listener callbacks only ever run from `deliver_*`; `send` and `close`
//! never invoke a listener, so callers may hold their own locks across them.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ChatError;

/// Close code for an intentional shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code for an endpoint going away (server restart, page unload).
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code reported when the peer sent a close frame with no status.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Whether a close code means the connection was shut down on purpose.
pub fn is_normal_close(code: u16) -> bool {
    matches!(code, CLOSE_NORMAL | CLOSE_GOING_AWAY)
}

/// Whether a close code means the connection dropped without a proper status.
pub fn is_abnormal_close(code: u16) -> bool {
    matches!(code, CLOSE_NO_STATUS | CLOSE_ABNORMAL)
}

/// Socket ready state, mirroring the WebSocket lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Work queued for the transport driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// Receives socket events for one connection.
///
/// Exactly one listener is installed at a time; adopting a connection swaps
/// it in place with [`Connection::set_listener`].
pub trait Listener: Send + Sync {
    fn on_open(&self, conn: &Connection);
    fn on_message(&self, conn: &Connection, text: &str);
    fn on_error(&self, conn: &Connection, detail: &str);
    fn on_close(&self, conn: &Connection, code: u16);
}

/// Opens connections to a URL.
pub trait Connector: Send + Sync {
    /// Start opening a connection. The returned handle is in
    /// [`ReadyState::Connecting`] and `listener` is installed before any
    /// event can be delivered.
    fn open(&self, url: &str, listener: Arc<dyn Listener>) -> Connection;
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    url: String,
    state: Mutex<ReadyState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    listener: Mutex<Option<Arc<dyn Listener>>>,
    heartbeat_claimed: AtomicBool,
    closed: CancellationToken,
}

/// Shared handle to one transport connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Create a handle in the connecting state along with the queue its
    /// driver drains.
    pub fn new(url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            url: url.into(),
            state: Mutex::new(ReadyState::Connecting),
            outbound: tx,
            listener: Mutex::new(None),
            heartbeat_claimed: AtomicBool::new(false),
            closed: CancellationToken::new(),
        };
        (Self { inner: Arc::new(inner) }, rx)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.inner.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    pub fn is_closing_or_closed(&self) -> bool {
        matches!(self.ready_state(), ReadyState::Closing | ReadyState::Closed)
    }

    /// Install a listener, returning the one it replaced.
    pub fn set_listener(&self, listener: Arc<dyn Listener>) -> Option<Arc<dyn Listener>> {
        self.inner.listener.lock().replace(listener)
    }

    /// Queue a text frame. Fails unless the connection is open.
    pub fn send(&self, text: String) -> Result<(), ChatError> {
        match self.ready_state() {
            ReadyState::Open => {}
            ReadyState::Connecting => return Err(ChatError::NotOpen),
            ReadyState::Closing | ReadyState::Closed => return Err(ChatError::Closed),
        }
        self.inner.outbound.send(Outbound::Text(text)).map_err(|_| ChatError::Transport)
    }

    /// Request a close. Best effort; a no-op once closing or closed.
    pub fn close(&self, code: u16, reason: &str) {
        {
            let mut state = self.inner.state.lock();
            match *state {
                ReadyState::Closing | ReadyState::Closed => return,
                ReadyState::Connecting | ReadyState::Open => *state = ReadyState::Closing,
            }
        }
        // Driver already gone: nothing left to close.
        let _ = self.inner.outbound.send(Outbound::Close { code, reason: reason.to_owned() });
    }

    /// Resolves once the connection reaches [`ReadyState::Closed`].
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await
    }

    /// Claim the single heartbeat slot for this connection.
    pub(crate) fn claim_heartbeat(&self) -> bool {
        !self.inner.heartbeat_claimed.swap(true, Ordering::AcqRel)
    }

    /// Release the heartbeat slot so a later owner may claim it.
    pub(crate) fn release_heartbeat(&self) {
        self.inner.heartbeat_claimed.store(false, Ordering::Release);
    }

    fn listener(&self) -> Option<Arc<dyn Listener>> {
        self.inner.listener.lock().clone()
    }

    /// Transport reports the handshake completed.
    pub fn deliver_open(&self) {
        {
            let mut state = self.inner.state.lock();
            // A close requested mid-handshake wins over the open.
            if *state != ReadyState::Connecting {
                return;
            }
            *state = ReadyState::Open;
        }
        if let Some(listener) = self.listener() {
            listener.on_open(self);
        }
    }

    /// Transport reports an inbound text frame.
    pub fn deliver_message(&self, text: &str) {
        if self.ready_state() == ReadyState::Closed {
            return;
        }
        if let Some(listener) = self.listener() {
            listener.on_message(self, text);
        }
    }

    /// Transport reports a socket-level error. A close always follows.
    pub fn deliver_error(&self, detail: &str) {
        if self.ready_state() == ReadyState::Closed {
            return;
        }
        if let Some(listener) = self.listener() {
            listener.on_error(self, detail);
        }
    }

    /// Transport reports the connection closed. Delivered at most once; the
    /// listener is released afterwards.
    pub fn deliver_close(&self, code: u16) {
        {
            let mut state = self.inner.state.lock();
            if *state == ReadyState::Closed {
                return;
            }
            *state = ReadyState::Closed;
        }
        self.inner.closed.cancel();
        let listener = self.inner.listener.lock().take();
        if let Some(listener) = listener {
            listener.on_close(self, code);
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("state", &self.ready_state())
            .finish()
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
