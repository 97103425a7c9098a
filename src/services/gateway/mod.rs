pub(crate) mod session;

use crate::config::WsConfig;
use crate::domain::user::User;
use crate::services::chat_service::ChatService;
use crate::services::gateway::session::Session;
use crate::services::session_registry::SessionRegistry;
use axum::extract::ws::WebSocket;
use opentelemetry::{
    global,
    metrics::{Counter, UpDownCounter},
};

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) active_connections: UpDownCounter<i64>,
    pub(crate) frames_received_total: Counter<u64>,
    pub(crate) invalid_frames_total: Counter<u64>,
    pub(crate) heartbeat_timeouts_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("freight-chat-server");
        Self {
            active_connections: meter
                .i64_up_down_counter("websocket_active_connections")
                .with_description("Number of active WebSocket connections")
                .build(),
            frames_received_total: meter
                .u64_counter("websocket_frames_received_total")
                .with_description("Client commands received, by type")
                .build(),
            invalid_frames_total: meter
                .u64_counter("websocket_invalid_frames_total")
                .with_description("Client frames that could not be parsed")
                .build(),
            heartbeat_timeouts_total: meter
                .u64_counter("websocket_heartbeat_timeouts_total")
                .with_description("Connections closed for missing heartbeat replies")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs authenticated WebSocket connections.
#[derive(Clone, Debug)]
pub struct GatewayService {
    chat_service: ChatService,
    registry: SessionRegistry,
    config: WsConfig,
    metrics: Metrics,
}

impl GatewayService {
    #[must_use]
    pub fn new(chat_service: ChatService, registry: SessionRegistry, config: WsConfig) -> Self {
        Self { chat_service, registry, config, metrics: Metrics::new() }
    }

    /// Drives `socket` until the client leaves or the server shuts down.
    ///
    /// `user` must already be authenticated.
    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        user: User,
        request_id: String,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let session = Session {
            user,
            request_id,
            socket,
            chat_service: self.chat_service.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            shutdown_rx,
        };

        session.run().await;
    }
}
