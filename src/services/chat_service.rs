use crate::config::ChatConfig;
use crate::domain::conversation::{AppendTarget, Conversation, ConversationKey, ConversationSummary};
use crate::domain::message::MessageView;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::delivery::DeliveryRouter;
use crate::services::session_registry::{ConnectionId, SessionRegistry};
use crate::storage::announcement_repo::TransportDirectory;
use crate::storage::conversation_repo::ConversationStore;
use crate::storage::user_repo::UserDirectory;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    conversations_created_total: Counter<u64>,
    marked_read_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("freight-chat-server");
        Self {
            sent_total: meter
                .u64_counter("chat_messages_sent_total")
                .with_description("Send attempts by outcome")
                .build(),
            conversations_created_total: meter
                .u64_counter("chat_conversations_created_total")
                .with_description("Conversations created by a first message")
                .build(),
            marked_read_total: meter
                .u64_counter("chat_messages_marked_read_total")
                .with_description("Messages flipped to read")
                .build(),
        }
    }
}

/// A send request as issued by a client.
///
/// When `conversation_id` does not resolve, `origin_context` and `counterparty_id` together
/// identify the conversation to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessage {
    pub conversation_id: Option<Uuid>,
    pub content: String,
    pub origin_context: Option<Uuid>,
    pub counterparty_id: Option<Uuid>,
}

/// Orchestrates join, send and read operations for authenticated callers.
#[derive(Clone, Debug)]
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    users: Arc<dyn UserDirectory>,
    transports: Arc<dyn TransportDirectory>,
    registry: SessionRegistry,
    router: DeliveryRouter,
    config: ChatConfig,
    metrics: Metrics,
}

impl ChatService {
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        users: Arc<dyn UserDirectory>,
        transports: Arc<dyn TransportDirectory>,
        registry: SessionRegistry,
        config: ChatConfig,
    ) -> Self {
        let router = DeliveryRouter::new(registry.clone());
        Self { store, users, transports, registry, router, config, metrics: Metrics::new() }
    }

    /// Adds the conversation room to the connection's subscriptions.
    ///
    /// Unless strict joining is configured no membership check is made here; sends and reads
    /// are authorized on their own.
    ///
    /// # Errors
    /// With strict joining, returns `AppError::ConversationNotFound` or `AppError::NotAuthorized`
    /// when the caller is not a participant of an existing conversation.
    #[tracing::instrument(
        err(level = "debug"),
        skip(self, caller),
        fields(connection_id = %connection_id, user_id = %caller.id)
    )]
    pub async fn join_chat(&self, connection_id: ConnectionId, caller: &User, conversation_id: Uuid) -> Result<()> {
        if self.config.strict_join {
            self.participant_conversation(caller.id, conversation_id).await?;
        }

        if self.registry.join(connection_id, conversation_id) {
            Ok(())
        } else {
            tracing::warn!("Join attempted on a connection that is not admitted");
            Err(AppError::Internal)
        }
    }

    /// Stores a message and delivers it to the room and to the other participant.
    ///
    /// Nothing is delivered unless the message was stored.
    ///
    /// # Errors
    /// Returns `AppError::ConversationNotFound` if no conversation resolves and none can be created.
    /// Returns `AppError::NotAuthorized` if the caller is not a participant.
    /// Returns `AppError::InvalidMessage` if the content is blank or too long.
    /// Returns `AppError::Persistence` if the message cannot be stored.
    #[tracing::instrument(
        err(level = "debug"),
        skip(self, caller, request),
        fields(user_id = %caller.id, conversation_id = tracing::field::Empty, seq = tracing::field::Empty)
    )]
    pub async fn send_message(&self, caller: &User, request: SendMessage) -> Result<MessageView> {
        let target = self.resolve_target(caller, &request).await?;
        let content = self.validate_content(request.content)?;

        let (conversation, message) = match self.store.append_message(target, caller.id, content).await {
            Ok(stored) => stored,
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                return Err(e);
            }
        };

        self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
        if message.seq == 1 {
            self.metrics.conversations_created_total.add(1, &[]);
        }

        let span = tracing::Span::current();
        span.record("conversation_id", tracing::field::display(conversation.id));
        span.record("seq", message.seq);

        let view = message.into_view(caller.display_name());
        let report = self.router.deliver(&conversation, &view);
        tracing::debug!(room = report.room, notified = report.notification, "Message delivered");

        Ok(view)
    }

    /// Marks every message the other participant wrote as read. Returns how many flipped.
    ///
    /// # Errors
    /// Returns `AppError::ConversationNotFound` if the conversation does not exist.
    /// Returns `AppError::NotAuthorized` if the caller is not a participant.
    #[tracing::instrument(err(level = "debug"), skip(self), fields(user_id = %caller_id))]
    pub async fn mark_conversation_read(&self, caller_id: Uuid, conversation_id: Uuid) -> Result<u64> {
        self.participant_conversation(caller_id, conversation_id).await?;

        let flipped = self.store.mark_read(conversation_id, caller_id).await?;
        self.metrics.marked_read_total.add(flipped, &[]);

        Ok(flipped)
    }

    /// Conversations the caller takes part in, most recently active first.
    ///
    /// # Errors
    /// Returns `AppError::Persistence` if the query fails.
    #[tracing::instrument(err(level = "debug"), skip(self), fields(user_id = %caller_id))]
    pub async fn list_conversations(&self, caller_id: Uuid) -> Result<Vec<ConversationSummary>> {
        self.store.list_for_user(caller_id).await
    }

    /// Full message history of a conversation, in order.
    ///
    /// # Errors
    /// Returns `AppError::ConversationNotFound` if the conversation does not exist.
    /// Returns `AppError::NotAuthorized` if the caller is not a participant.
    #[tracing::instrument(err(level = "debug"), skip(self), fields(user_id = %caller_id))]
    pub async fn conversation_messages(&self, caller_id: Uuid, conversation_id: Uuid) -> Result<Vec<MessageView>> {
        self.participant_conversation(caller_id, conversation_id).await?;
        self.store.list_messages(conversation_id).await
    }

    async fn participant_conversation(&self, caller_id: Uuid, conversation_id: Uuid) -> Result<Conversation> {
        let conversation = self.store.find(conversation_id).await?.ok_or(AppError::ConversationNotFound)?;

        if conversation.is_participant(caller_id) { Ok(conversation) } else { Err(AppError::NotAuthorized) }
    }

    async fn resolve_target(&self, caller: &User, request: &SendMessage) -> Result<AppendTarget> {
        if let Some(conversation_id) = request.conversation_id
            && let Some(conversation) = self.store.find(conversation_id).await?
        {
            if !conversation.is_participant(caller.id) {
                return Err(AppError::NotAuthorized);
            }
            return Ok(AppendTarget::Existing(conversation.id));
        }

        let (Some(announcement_id), Some(counterparty_id)) = (request.origin_context, request.counterparty_id) else {
            return Err(AppError::ConversationNotFound);
        };

        let Some(announcement) = self.transports.find_announcement(announcement_id).await? else {
            tracing::debug!(%announcement_id, "Origin announcement does not exist");
            return Err(AppError::ConversationNotFound);
        };

        let Some(counterparty) = self.users.find_user(counterparty_id).await? else {
            tracing::debug!(%counterparty_id, "Counterparty does not exist");
            return Err(AppError::ConversationNotFound);
        };

        let Some(key) = ConversationKey::for_pair(caller, &counterparty, announcement.id) else {
            tracing::debug!(caller_role = %caller.role, counterparty_role = %counterparty.role, "Users do not form a driver/sender pair");
            return Err(AppError::ConversationNotFound);
        };

        if key.driver_id != announcement.driver_id {
            tracing::debug!(%announcement_id, "Driver of the pair does not own the announcement");
            return Err(AppError::ConversationNotFound);
        }

        Ok(AppendTarget::Keyed(key))
    }

    fn validate_content(&self, content: String) -> Result<String> {
        if content.trim().is_empty() {
            return Err(AppError::InvalidMessage("Message content must not be empty".to_string()));
        }

        let length = content.chars().count();
        if length > self.config.max_message_length {
            return Err(AppError::InvalidMessage(format!(
                "Message is {length} characters long, the limit is {}",
                self.config.max_message_length
            )));
        }

        Ok(content)
    }
}
