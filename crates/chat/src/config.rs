// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::reconnect::ReconnectPolicy;

/// Configuration for chat connections.
#[derive(Debug, Clone, clap::Args)]
pub struct ChatConfig {
    /// HTTP(S) base URL of the console backend. The chat socket uses the
    /// matching ws(s) scheme.
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "TICKETCHAT_BASE_URL")]
    pub base_url: String,

    /// Session cookie sent on the WebSocket handshake.
    #[arg(long, env = "TICKETCHAT_SESSION_COOKIE")]
    pub session_cookie: Option<String>,

    /// Heartbeat interval in milliseconds.
    #[arg(long, default_value_t = 25_000, env = "TICKETCHAT_HEARTBEAT_MS")]
    pub heartbeat_ms: u64,

    /// Base reconnect delay in milliseconds (doubled per attempt).
    #[arg(long, default_value_t = 8_000, env = "TICKETCHAT_RECONNECT_BASE_MS")]
    pub reconnect_base_ms: u64,

    /// Minimum reconnect delay in milliseconds.
    #[arg(long, default_value_t = 8_000, env = "TICKETCHAT_RECONNECT_MIN_MS")]
    pub reconnect_min_ms: u64,

    /// Minimum reconnect delay after an abnormal close (1005/1006).
    #[arg(long, default_value_t = 12_000, env = "TICKETCHAT_ABNORMAL_CLOSE_FLOOR_MS")]
    pub abnormal_close_floor_ms: u64,

    /// Automatic reconnect attempts before giving up.
    #[arg(long, default_value_t = 3, env = "TICKETCHAT_MAX_RECONNECT_ATTEMPTS")]
    pub max_reconnect_attempts: u32,

    /// Delay between mount and the first connect, coalescing mount churn.
    #[arg(long, default_value_t = 100, env = "TICKETCHAT_CONNECT_DEBOUNCE_MS")]
    pub connect_debounce_ms: u64,

    /// Registry sweep interval in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "TICKETCHAT_SWEEP_INTERVAL_MS")]
    pub sweep_interval_ms: u64,

    /// Idle time after which a registered connection is closed.
    #[arg(long, default_value_t = 300_000, env = "TICKETCHAT_STALE_AFTER_MS")]
    pub stale_after_ms: u64,

    /// Messages retained per connection.
    #[arg(long, default_value_t = 500, env = "TICKETCHAT_MESSAGE_CACHE_CAPACITY")]
    pub message_cache_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_owned(),
            session_cookie: None,
            heartbeat_ms: 25_000,
            reconnect_base_ms: 8_000,
            reconnect_min_ms: 8_000,
            abnormal_close_floor_ms: 12_000,
            max_reconnect_attempts: 3,
            connect_debounce_ms: 100,
            sweep_interval_ms: 60_000,
            stale_after_ms: 300_000,
            message_cache_capacity: 500,
        }
    }
}

impl ChatConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base url must start with http:// or https://: {}", self.base_url);
        }
        if self.message_cache_capacity == 0 {
            anyhow::bail!("message cache capacity must be at least 1");
        }
        if self.heartbeat_ms == 0 || self.sweep_interval_ms == 0 {
            anyhow::bail!("heartbeat and sweep intervals must be non-zero");
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn connect_debounce(&self) -> Duration {
        Duration::from_millis(self.connect_debounce_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base: Duration::from_millis(self.reconnect_base_ms),
            min_delay: Duration::from_millis(self.reconnect_min_ms),
            abnormal_floor: Duration::from_millis(self.abnormal_close_floor_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
