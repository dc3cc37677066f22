// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the chat connection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatError {
    NotOpen,
    Closed,
    MalformedFrame,
    UnknownKind,
    Transport,
    InvalidUrl,
}

impl ChatError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotOpen => "NOT_OPEN",
            Self::Closed => "CLOSED",
            Self::MalformedFrame => "MALFORMED_FRAME",
            Self::UnknownKind => "UNKNOWN_KIND",
            Self::Transport => "TRANSPORT",
            Self::InvalidUrl => "INVALID_URL",
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ChatError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
