// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

use super::ChatConfig;
use crate::reconnect::ReconnectPolicy;

#[derive(Debug, Parser)]
struct TestCli {
    #[command(flatten)]
    chat: ChatConfig,
}

fn parse(args: &[&str]) -> ChatConfig {
    TestCli::parse_from(args).chat
}

#[test]
fn defaults_match_default_impl() {
    let parsed = parse(&["ticketchat"]);
    let default = ChatConfig::default();
    assert_eq!(parsed.base_url, default.base_url);
    assert_eq!(parsed.heartbeat_ms, default.heartbeat_ms);
    assert_eq!(parsed.max_reconnect_attempts, default.max_reconnect_attempts);
    assert_eq!(parsed.stale_after_ms, default.stale_after_ms);
    assert_eq!(parsed.message_cache_capacity, default.message_cache_capacity);
}

#[test]
fn default_policy_matches_reconnect_defaults() {
    assert_eq!(ChatConfig::default().reconnect_policy(), ReconnectPolicy::default());
}

#[test]
fn duration_accessors() {
    let config = parse(&["ticketchat", "--heartbeat-ms", "1000", "--sweep-interval-ms", "5"]);
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(1));
    assert_eq!(config.sweep_interval(), Duration::from_millis(5));
    assert_eq!(config.connect_debounce(), Duration::from_millis(100));
    assert_eq!(config.stale_after(), Duration::from_secs(300));
}

#[test]
fn valid_default_config() -> anyhow::Result<()> {
    ChatConfig::default().validate()
}

#[yare::parameterized(
    ws_scheme = { &["ticketchat", "--base-url", "ws://host"], "http:// or https://" },
    zero_cache = { &["ticketchat", "--message-cache-capacity", "0"], "capacity" },
    zero_heartbeat = { &["ticketchat", "--heartbeat-ms", "0"], "non-zero" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    let config = parse(args);
    crate::assert_err_contains!(config.validate(), expected_substr);
}
