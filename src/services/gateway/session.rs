use crate::config::WsConfig;
use crate::domain::events::{ClientCommand, ServerEvent};
use crate::domain::user::User;
use crate::error::AppError;
use crate::services::chat_service::{ChatService, SendMessage};
use crate::services::gateway::Metrics;
use crate::services::session_registry::{ConnectionId, SessionRegistry};
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use opentelemetry::KeyValue;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

pub(crate) struct Session {
    pub(crate) user: User,
    pub(crate) request_id: String,
    pub(crate) socket: WebSocket,
    pub(crate) chat_service: ChatService,
    pub(crate) registry: SessionRegistry,
    pub(crate) metrics: Metrics,
    pub(crate) config: WsConfig,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
}

impl Session {
    #[tracing::instrument(
        name = "websocket_session",
        skip(self),
        fields(
            user_id = %self.user.id,
            request_id = %self.request_id,
            otel.kind = "server",
            ws.session_id = tracing::field::Empty
        )
    )]
    pub(crate) async fn run(self) {
        let Self { user, socket, chat_service, registry, metrics, config, mut shutdown_rx, .. } = self;

        let connection_id = ConnectionId::new();
        tracing::Span::current().record("ws.session_id", tracing::field::display(connection_id));

        let mut outbound_rx = registry.admit(connection_id, user.id);
        metrics.active_connections.add(1, &[]);
        tracing::info!("WebSocket connected");

        let (mut ws_sink, mut ws_stream) = socket.split();

        let ping_interval = Duration::from_secs(config.ping_interval_secs.max(1));
        let silence_limit = ping_interval + Duration::from_secs(config.ping_timeout_secs);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                biased;

                () = shutdown_signal(&mut shutdown_rx) => {
                    tracing::info!("Shutdown signal received, closing WebSocket");
                    let _ = ws_sink
                        .send(WsMessage::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "Server shutting down".into(),
                        })))
                        .await;
                    break;
                }

                msg = ws_stream.next() => {
                    let reply = match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            last_seen = Instant::now();
                            match serde_json::from_str::<ClientCommand>(text.as_str()) {
                                Ok(command) => {
                                    metrics.frames_received_total.add(1, &[KeyValue::new("type", command_name(&command))]);
                                    handle_command(&chat_service, connection_id, &user, command).await
                                }
                                Err(e) => {
                                    tracing::debug!(error = %e, "Failed to parse client frame");
                                    metrics.invalid_frames_total.add(1, &[]);
                                    Some(ServerEvent::Error { code: "invalid_frame".into(), message: "Malformed frame".into() })
                                }
                            }
                        }
                        Some(Ok(WsMessage::Binary(_))) => {
                            last_seen = Instant::now();
                            metrics.invalid_frames_total.add(1, &[]);
                            Some(ServerEvent::Error { code: "invalid_frame".into(), message: "Binary frames are not supported".into() })
                        }
                        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                            last_seen = Instant::now();
                            None
                        }
                        Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                    };

                    if let Some(event) = reply
                        && !send_event(&mut ws_sink, &event).await
                    {
                        break;
                    }
                }

                event = outbound_rx.recv() => {
                    match event {
                        Some(event) => {
                            if !send_event(&mut ws_sink, &event).await { break; }
                        }
                        None => break,
                    }
                }

                _ = heartbeat.tick() => {
                    if last_seen.elapsed() > silence_limit {
                        tracing::info!("Heartbeat timed out, closing WebSocket");
                        metrics.heartbeat_timeouts_total.add(1, &[]);
                        break;
                    }
                    if ws_sink.send(WsMessage::Ping(Bytes::new())).await.is_err() { break; }
                }
            }
        }

        let _ = ws_sink.close().await;
        registry.remove(connection_id);

        metrics.active_connections.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
}

/// Completes once shutdown is requested or every shutdown sender has been dropped.
async fn shutdown_signal(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|&stop| stop).await;
}

/// Executes one client command. Returns the frame to send back to this connection, if any.
async fn handle_command(
    chat_service: &ChatService,
    connection_id: ConnectionId,
    user: &User,
    command: ClientCommand,
) -> Option<ServerEvent> {
    let result = match command {
        ClientCommand::JoinChat { chat_id } => chat_service.join_chat(connection_id, user, chat_id).await,
        ClientCommand::SendMessage { chat_id, content, announcement_id, receiver_id } => {
            let request =
                SendMessage { conversation_id: chat_id, content, origin_context: announcement_id, counterparty_id: receiver_id };
            chat_service.send_message(user, request).await.map(|_| ())
        }
        ClientCommand::MarkRead { chat_id } => chat_service.mark_conversation_read(user.id, chat_id).await.map(|_| ()),
        ClientCommand::Ping => return Some(ServerEvent::Pong),
    };

    result.err().map(|e| error_event(&e))
}

fn error_event(error: &AppError) -> ServerEvent {
    match error {
        AppError::Persistence(e) => tracing::error!(error = %e, "Gateway command failed to persist"),
        AppError::Internal => tracing::error!("Gateway command failed"),
        other => tracing::debug!(error = %other, "Gateway command rejected"),
    }

    ServerEvent::Error { code: error.code().to_string(), message: error.public_message() }
}

const fn command_name(command: &ClientCommand) -> &'static str {
    match command {
        ClientCommand::JoinChat { .. } => "join-chat",
        ClientCommand::SendMessage { .. } => "send-message",
        ClientCommand::MarkRead { .. } => "mark-read",
        ClientCommand::Ping => "ping",
    }
}

async fn send_event<S>(sink: &mut S, event: &ServerEvent) -> bool
where
    S: futures::Sink<WsMessage> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(text) => sink.send(WsMessage::Text(text.into())).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server event");
            true
        }
    }
}
