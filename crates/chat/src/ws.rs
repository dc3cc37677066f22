// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport: one tokio-tungstenite socket per [`Connection`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, COOKIE};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::{
    Connection, Connector, Listener, Outbound, CLOSE_ABNORMAL, CLOSE_NO_STATUS,
};
use crate::error::ChatError;
use crate::key::ConnectionKey;

/// How long to wait for the peer to answer a close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything but RFC 3986 unreserved characters is escaped in ids.
const ID_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Connector backed by real WebSocket sockets.
///
/// The session cookie rides on the handshake the way a browser attaches
/// ambient credentials; no application-level auth header is sent.
pub struct WsConnector {
    session_cookie: Option<String>,
}

impl WsConnector {
    pub fn new(session_cookie: Option<String>) -> Self {
        Self { session_cookie }
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, listener: Arc<dyn Listener>) -> Connection {
        let (conn, outbound) = Connection::new(url);
        conn.set_listener(listener);
        let driver = conn.clone();
        let cookie = self.session_cookie.clone();
        tokio::spawn(async move {
            drive(driver, outbound, cookie).await;
        });
        conn
    }
}

/// Build the chat socket URL for `key` from an HTTP base URL. The
/// conversation and tab ids are percent-encoded.
pub fn chat_ws_url(base_url: &str, key: &ConnectionKey) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if base.starts_with("https://") {
        base.replacen("https://", "wss://", 1)
    } else {
        base.replacen("http://", "ws://", 1)
    };
    let conversation = utf8_percent_encode(&key.conversation_id, ID_ESCAPE);
    let tab = utf8_percent_encode(key.tab_id.as_str(), ID_ESCAPE);
    format!("{ws_base}/ws/chat/{conversation}?tab_id={tab}")
}

async fn drive(
    conn: Connection,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    cookie: Option<String>,
) {
    let mut request = match conn.url().into_client_request() {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(url = conn.url(), err = %e, "invalid chat socket url");
            conn.deliver_error(&format!("{}: {e}", ChatError::InvalidUrl));
            conn.deliver_close(CLOSE_ABNORMAL);
            return;
        }
    };
    if let Some(cookie) = cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                request.headers_mut().insert(COOKIE, value);
            }
            Err(e) => tracing::warn!(err = %e, "session cookie is not a valid header value"),
        }
    }

    let ws_stream = match tokio_tungstenite::connect_async(request).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::debug!(url = conn.url(), err = %e, "chat socket connect failed");
            conn.deliver_error(&format!("{}: {e}", ChatError::Transport));
            conn.deliver_close(CLOSE_ABNORMAL);
            return;
        }
    };

    tracing::debug!(url = conn.url(), "chat socket connected");
    conn.deliver_open();
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            out = outbound.recv() => {
                match out {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            conn.deliver_error(&e.to_string());
                            conn.deliver_close(CLOSE_ABNORMAL);
                            return;
                        }
                    }
                    Some(Outbound::Close { code, reason }) => {
                        let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                        if write.send(Message::Close(Some(frame))).await.is_ok() {
                            // Drain until the peer acknowledges or the timeout lapses.
                            let _ = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
                                while let Some(Ok(msg)) = read.next().await {
                                    if matches!(msg, Message::Close(_)) {
                                        break;
                                    }
                                }
                            })
                            .await;
                        }
                        conn.deliver_close(code);
                        return;
                    }
                    // Every handle dropped; nobody is left to hear about it.
                    None => return,
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => conn.deliver_message(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_NO_STATUS);
                        tracing::debug!(url = conn.url(), code, "chat socket closed by peer");
                        conn.deliver_close(code);
                        return;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary ignored
                    Some(Err(e)) => {
                        tracing::debug!(url = conn.url(), err = %e, "chat socket error");
                        conn.deliver_error(&e.to_string());
                        conn.deliver_close(CLOSE_ABNORMAL);
                        return;
                    }
                    None => {
                        conn.deliver_close(CLOSE_ABNORMAL);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
