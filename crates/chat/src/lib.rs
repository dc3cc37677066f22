// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ticketchat: persistent per-ticket chat connections for the triage console.

pub mod cache;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod key;
pub mod protocol;
pub mod reconnect;
pub mod registry;
pub mod test_support;
pub mod ws;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ChatConfig;
use crate::connection::Connector;
use crate::controller::{ChatController, ControllerSettings, Principal};
use crate::key::{ConnectionKey, TabId};
use crate::registry::{spawn_sweeper, ConnectionRegistry};
use crate::ws::WsConnector;

/// Composition root for one client context.
///
/// Owns the tab id shared by every controller it creates, the connection
/// registry, and the registry sweeper. Dropping the runtime does not close
/// connections; call [`ChatRuntime::shutdown`].
pub struct ChatRuntime {
    config: ChatConfig,
    tab_id: TabId,
    registry: Arc<ConnectionRegistry>,
    connector: Arc<dyn Connector>,
    shutdown: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl ChatRuntime {
    /// Start a runtime with the given connector and spawn the sweeper.
    pub fn start(config: ChatConfig, connector: Arc<dyn Connector>) -> Self {
        let registry = Arc::new(ConnectionRegistry::with_capacity(config.message_cache_capacity));
        let shutdown = CancellationToken::new();
        let sweeper = spawn_sweeper(
            Arc::clone(&registry),
            config.sweep_interval(),
            config.stale_after(),
            shutdown.clone(),
        );
        let tab_id = TabId::generate();
        tracing::debug!(tab = %tab_id, base_url = %config.base_url, "chat runtime started");
        Self { config, tab_id, registry, connector, shutdown, sweeper }
    }

    /// Start a runtime that talks to the configured backend over WebSocket.
    pub fn start_ws(config: ChatConfig) -> Self {
        let connector = Arc::new(WsConnector::new(config.session_cookie.clone()));
        Self::start(config, connector)
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Build a controller for `conversation_id` in this context.
    pub fn controller(
        &self,
        conversation_id: &str,
        principal: Option<Principal>,
    ) -> ChatController {
        let key = ConnectionKey::new(conversation_id, self.tab_id.clone());
        let settings = ControllerSettings::from_config(&self.config, &key);
        ChatController::new(
            key,
            principal,
            settings,
            Arc::clone(&self.registry),
            Arc::clone(&self.connector),
        )
    }

    /// Stop the sweeper and close every registered connection.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.sweeper.await;
        self.registry.shutdown();
        tracing::debug!(tab = %self.tab_id, "chat runtime stopped");
    }
}
