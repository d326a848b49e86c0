//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::domain::PresenceRegistry;
use crate::service::PresenceService;
use crate::shutdown::Shutdown;
use crate::ws::connection::ConnectionSettings;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Presence service owning the guest registry.
    pub presence: PresenceService,
    /// Shutdown signal observed by WebSocket connection tasks.
    pub shutdown: Shutdown,
    /// Write timeout and keepalive timings for guest sockets.
    pub ws: ConnectionSettings,
}

impl AppState {
    /// Builds fresh state with an empty registry.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let registry = Arc::new(PresenceRegistry::new());
        Self {
            presence: PresenceService::new(registry, config.guest_queue_capacity),
            shutdown: Shutdown::new(),
            ws: ConnectionSettings {
                send_timeout: config.ws_send_timeout,
                ping_interval: config.ping_interval,
                pong_timeout: config.pong_timeout,
            },
        }
    }
}
