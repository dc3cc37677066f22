// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect backoff arithmetic, kept free of timers so it can be tested
//! directly.

use std::time::Duration;

use crate::connection::{is_abnormal_close, is_normal_close};

/// What to do after a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPlan {
    /// Closed on purpose; stay down.
    Stop,
    /// Retry budget used up; stay down until an explicit connect.
    Exhausted,
    /// Reconnect after the given delay.
    Retry(Duration),
}

/// Exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub min_delay: Duration,
    pub abnormal_floor: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(8),
            min_delay: Duration::from_secs(8),
            abnormal_floor: Duration::from_secs(12),
            max_attempts: 3,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based).
    ///
    /// `base * 2^attempt`, never below `min_delay`, and never below
    /// `abnormal_floor` when the close carried no proper status.
    pub fn delay(&self, attempt: u32, abnormal: bool) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let mut delay = self.base.saturating_mul(factor).max(self.min_delay);
        if abnormal {
            delay = delay.max(self.abnormal_floor);
        }
        delay
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Decide the follow-up to a close with `code` after `attempt` retries.
    pub fn plan(&self, code: u16, attempt: u32) -> ReconnectPlan {
        if is_normal_close(code) {
            return ReconnectPlan::Stop;
        }
        if self.is_exhausted(attempt) {
            return ReconnectPlan::Exhausted;
        }
        ReconnectPlan::Retry(self.delay(attempt, is_abnormal_close(code)))
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
