// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scriptable connector and a recording listener.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::{Connection, Connector, Listener, Outbound};

/// One connection handed out by [`MockConnector`].
///
/// The test plays the transport: it calls `deliver_*` on `conn` and reads
/// whatever the code under test queued with [`MockSocket::sent`].
pub struct MockSocket {
    pub conn: Connection,
    outbound: Mutex<mpsc::UnboundedReceiver<Outbound>>,
}

impl MockSocket {
    /// Drain everything queued for the transport so far.
    pub fn sent(&self) -> Vec<Outbound> {
        let mut rx = self.outbound.lock();
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    /// Drain and return only the queued text frames.
    pub fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text(t) => Some(t),
                Outbound::Close { .. } => None,
            })
            .collect()
    }

    /// Complete a close the code under test requested, echoing its code.
    pub fn finish_close(&self) {
        let code = self
            .sent()
            .into_iter()
            .find_map(|o| match o {
                Outbound::Close { code, .. } => Some(code),
                Outbound::Text(_) => None,
            })
            .unwrap_or(crate::connection::CLOSE_NORMAL);
        self.conn.deliver_close(code);
    }
}

/// Connector that never touches the network.
#[derive(Default)]
pub struct MockConnector {
    sockets: Mutex<Vec<Arc<MockSocket>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of connections opened so far.
    pub fn opened(&self) -> usize {
        self.sockets.lock().len()
    }

    pub fn socket(&self, index: usize) -> Option<Arc<MockSocket>> {
        self.sockets.lock().get(index).cloned()
    }

    pub fn last(&self) -> Option<Arc<MockSocket>> {
        self.sockets.lock().last().cloned()
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &str, listener: Arc<dyn Listener>) -> Connection {
        let (conn, rx) = Connection::new(url);
        conn.set_listener(listener);
        self.sockets
            .lock()
            .push(Arc::new(MockSocket { conn: conn.clone(), outbound: Mutex::new(rx) }));
        conn
    }
}

/// Listener event captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Open(u64),
    Message(u64, String),
    Error(u64, String),
    Close(u64, u16),
}

/// Listener that records every callback in order.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }
}

impl Listener for RecordingListener {
    fn on_open(&self, conn: &Connection) {
        self.events.lock().push(Recorded::Open(conn.id()));
    }

    fn on_message(&self, conn: &Connection, text: &str) {
        self.events.lock().push(Recorded::Message(conn.id(), text.to_owned()));
    }

    fn on_error(&self, conn: &Connection, detail: &str) {
        self.events.lock().push(Recorded::Error(conn.id(), detail.to_owned()));
    }

    fn on_close(&self, conn: &Connection, code: u16) {
        self.events.lock().push(Recorded::Close(conn.id(), code));
    }
}

/// Assert that an expression evaluates to `Err` whose message
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
