use crate::domain::events::ServerEvent;
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, UpDownCounter},
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    active_sessions: UpDownCounter<i64>,
    events_delivered_total: Counter<u64>,
    events_dropped_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("freight-chat-server");
        Self {
            active_sessions: meter
                .i64_up_down_counter("chat_live_sessions")
                .with_description("Number of admitted live sessions")
                .build(),
            events_delivered_total: meter
                .u64_counter("chat_events_delivered_total")
                .with_description("Events queued onto a live session's outbound buffer")
                .build(),
            events_dropped_total: meter
                .u64_counter("chat_events_dropped_total")
                .with_description("Events dropped because a recipient buffer was full or closed")
                .build(),
        }
    }
}

/// Identifies one physical gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Broadcast scope: a conversation room or a user's personal notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Room(Uuid),
    Personal(Uuid),
}

#[derive(Debug)]
struct LiveSession {
    user_id: Uuid,
    joined_rooms: HashSet<Uuid>,
    outbound: mpsc::Sender<ServerEvent>,
}

/// Tracks live connections, the user each belongs to and the rooms each has joined.
///
/// Cloning yields another handle onto the same registry. Lock order is always
/// `sessions` before `channels`; `broadcast` never holds both.
#[derive(Clone, Debug)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<ConnectionId, LiveSession>>,
    channels: Arc<DashMap<Channel, HashSet<ConnectionId>>>,
    outbound_buffer_size: usize,
    metrics: Metrics,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(outbound_buffer_size: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            channels: Arc::new(DashMap::new()),
            outbound_buffer_size: outbound_buffer_size.max(1),
            metrics: Metrics::new(),
        }
    }

    /// Registers a live session and subscribes it to the user's personal channel.
    ///
    /// Returns the receiving end of the session's outbound event buffer.
    #[tracing::instrument(level = "debug", skip(self), fields(connection_id = %connection_id, user_id = %user_id))]
    pub fn admit(&self, connection_id: ConnectionId, user_id: Uuid) -> mpsc::Receiver<ServerEvent> {
        let (outbound, rx) = mpsc::channel(self.outbound_buffer_size);

        self.sessions.insert(connection_id, LiveSession { user_id, joined_rooms: HashSet::new(), outbound });
        self.channels.entry(Channel::Personal(user_id)).or_default().insert(connection_id);
        self.metrics.active_sessions.add(1, &[]);

        rx
    }

    /// Adds a conversation room to the connection's joined set. Idempotent.
    ///
    /// Returns `false` if the connection is not admitted.
    #[tracing::instrument(level = "debug", skip(self), fields(connection_id = %connection_id))]
    pub fn join(&self, connection_id: ConnectionId, conversation_id: Uuid) -> bool {
        let Some(mut session) = self.sessions.get_mut(&connection_id) else {
            return false;
        };

        if session.joined_rooms.insert(conversation_id) {
            self.channels.entry(Channel::Room(conversation_id)).or_default().insert(connection_id);
        }

        true
    }

    /// Drops the live session and every membership it held. Returns the session's user, if it was admitted.
    #[tracing::instrument(level = "debug", skip(self), fields(connection_id = %connection_id))]
    pub fn remove(&self, connection_id: ConnectionId) -> Option<Uuid> {
        let (_, session) = self.sessions.remove(&connection_id)?;

        let channels =
            session.joined_rooms.iter().map(|room| Channel::Room(*room)).chain([Channel::Personal(session.user_id)]);
        for channel in channels {
            if let Some(mut members) = self.channels.get_mut(&channel) {
                members.remove(&connection_id);
            }
            self.channels.remove_if(&channel, |_, members| members.is_empty());
        }

        self.metrics.active_sessions.add(-1, &[]);
        Some(session.user_id)
    }

    /// Queues `event` for every connection subscribed to `channel` without waiting on any of them.
    ///
    /// Recipients whose buffer is full or closed miss the event. Returns the number of connections it was queued for.
    pub fn broadcast(&self, channel: Channel, event: &ServerEvent) -> usize {
        let members: Vec<ConnectionId> = match self.channels.get(&channel) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for connection_id in members {
            let Some(session) = self.sessions.get(&connection_id) else {
                continue;
            };

            match session.outbound.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(%connection_id, ?channel, "Outbound buffer full, dropping event");
                    self.metrics.events_dropped_total.add(1, &[KeyValue::new("reason", "buffer_full")]);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%connection_id, ?channel, "Recipient connection closed, dropping event");
                    self.metrics.events_dropped_total.add(1, &[KeyValue::new("reason", "closed")]);
                }
            }
        }

        if delivered > 0 {
            self.metrics.events_delivered_total.add(delivered as u64, &[]);
        }
        delivered
    }

    #[cfg(test)]
    pub(crate) fn is_joined(&self, connection_id: ConnectionId, conversation_id: Uuid) -> bool {
        self.sessions.get(&connection_id).is_some_and(|session| session.joined_rooms.contains(&conversation_id))
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
