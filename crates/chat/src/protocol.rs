// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat wire protocol: outbound frame encoding and inbound frame validation.
//!
//! Outbound frames carry only `content` and `heartbeat`. Inbound frames are
//! accepted when they name one of six kinds, carry a string payload and a
//! numeric timestamp; anything else is rejected as a whole.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Kinds of frames the server may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Content,
    History,
    Status,
    Error,
    HeartbeatAck,
    Trace,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::History => "history",
            Self::Status => "status",
            Self::Error => "error",
            Self::HeartbeatAck => "heartbeat-ack",
            Self::Trace => "trace",
        }
    }

    /// Parse a wire kind string. Returns `None` for anything outside the set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "history" => Some(Self::History),
            "status" => Some(Self::Status),
            "error" => Some(Self::Error),
            "heartbeat-ack" => Some(Self::HeartbeatAck),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    /// Whether messages of this kind belong in the message cache.
    pub fn is_cached(&self) -> bool {
        !matches!(self, Self::HeartbeatAck)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant that authored a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// A validated inbound chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    /// Send time in seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
}

impl Message {
    pub fn new(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self { kind, payload: payload.into(), author: None, timestamp: epoch_secs(), frame_id: None }
    }

    pub fn with_author(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.author = Some(Author { id: id.into(), name: name.into() });
        self
    }
}

/// Kinds of frames the client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutboundKind {
    Content,
    Heartbeat,
}

/// Client-to-server wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub kind: OutboundKind,
    pub payload: String,
    pub timestamp: f64,
}

/// Encode a user chat message, stamped with the current client time.
pub fn encode_content(text: &str) -> Result<String, ChatError> {
    encode(OutboundKind::Content, text)
}

/// Encode a keep-alive frame with an empty payload.
pub fn encode_heartbeat() -> Result<String, ChatError> {
    encode(OutboundKind::Heartbeat, "")
}

fn encode(kind: OutboundKind, payload: &str) -> Result<String, ChatError> {
    let frame = OutboundFrame { kind, payload: payload.to_owned(), timestamp: epoch_secs() };
    serde_json::to_string(&frame).map_err(|_| ChatError::MalformedFrame)
}

/// Reason an inbound frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    NotJson,
    MissingKind,
    UnknownKind(String),
    MissingPayload,
    MissingTimestamp,
}

impl FrameError {
    pub fn code(&self) -> ChatError {
        match self {
            Self::UnknownKind(_) => ChatError::UnknownKind,
            _ => ChatError::MalformedFrame,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson => f.write_str("frame is not a JSON object"),
            Self::MissingKind => f.write_str("frame has no kind"),
            Self::UnknownKind(kind) => write!(f, "unknown frame kind: {kind}"),
            Self::MissingPayload => f.write_str("frame payload is missing or not a string"),
            Self::MissingTimestamp => f.write_str("frame timestamp is missing or not a number"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Decode and validate one inbound text frame.
pub fn decode(text: &str) -> Result<Message, FrameError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|_| FrameError::NotJson)?;
    let obj = value.as_object().ok_or(FrameError::NotJson)?;

    let kind_str = obj.get("kind").and_then(|v| v.as_str()).ok_or(FrameError::MissingKind)?;
    let kind =
        MessageKind::parse(kind_str).ok_or_else(|| FrameError::UnknownKind(kind_str.to_owned()))?;
    let payload =
        obj.get("payload").and_then(|v| v.as_str()).ok_or(FrameError::MissingPayload)?.to_owned();
    let timestamp =
        obj.get("timestamp").and_then(|v| v.as_f64()).ok_or(FrameError::MissingTimestamp)?;

    // A malformed author is dropped; it does not invalidate the frame.
    let author = obj.get("author").and_then(|v| serde_json::from_value::<Author>(v.clone()).ok());
    let frame_id = obj.get("frame_id").and_then(|v| v.as_str()).map(str::to_owned);

    Ok(Message { kind, payload, author, timestamp, frame_id })
}

/// Return current time as fractional seconds since the Unix epoch.
pub fn epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
