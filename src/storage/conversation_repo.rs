use crate::domain::conversation::{AppendTarget, Conversation, ConversationSummary};
use crate::domain::message::{ChatMessage, MessageView};
use crate::error::{AppError, Result};
use crate::storage::DbPool;
use crate::storage::records::{ConversationRecord, ConversationSummaryRecord, MessageRecord, MessageViewRecord};
use async_trait::async_trait;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

/// Durable record of conversations and their message histories.
///
/// Implementations must serialise concurrent appends to the same conversation so that
/// sequence numbers are gap-free and no message is lost, and must create a keyed
/// conversation at most once.
#[async_trait]
pub trait ConversationStore: Send + Sync + std::fmt::Debug {
    async fn find(&self, conversation_id: Uuid) -> Result<Option<Conversation>>;

    /// Appends a message, creating the conversation first when `target` is keyed and no
    /// conversation exists yet. Creation and append commit together or not at all.
    ///
    /// Returns the conversation as updated by the append together with the stored message.
    async fn append_message(
        &self,
        target: AppendTarget,
        sender_id: Uuid,
        content: String,
    ) -> Result<(Conversation, ChatMessage)>;

    /// Flags every unread message not authored by `reader_id` as read. Returns the number flipped.
    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<u64>;

    /// Conversations the user participates in, most recently active first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>>;

    /// Full history in append order.
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<MessageView>>;
}

#[derive(Clone, Debug)]
pub struct PgConversationStore {
    pool: DbPool,
}

impl PgConversationStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn lock_target(conn: &mut PgConnection, target: AppendTarget) -> Result<Option<ConversationRecord>> {
        let record = match target {
            AppendTarget::Existing(conversation_id) => {
                sqlx::query_as::<_, ConversationRecord>(
                    r#"
                    SELECT id, announcement_id, driver_id, sender_id, message_count, created_at, last_activity_at
                    FROM conversations
                    WHERE id = $1
                    FOR UPDATE
                    "#,
                )
                .bind(conversation_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            AppendTarget::Keyed(key) => {
                // Losers of a concurrent first-message race block here until the winner commits.
                sqlx::query(
                    r#"
                    INSERT INTO conversations (id, announcement_id, driver_id, sender_id)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (announcement_id, driver_id, sender_id) DO NOTHING
                    "#,
                )
                .bind(Uuid::now_v7())
                .bind(key.announcement_id)
                .bind(key.driver_id)
                .bind(key.sender_id)
                .execute(&mut *conn)
                .await?;

                sqlx::query_as::<_, ConversationRecord>(
                    r#"
                    SELECT id, announcement_id, driver_id, sender_id, message_count, created_at, last_activity_at
                    FROM conversations
                    WHERE announcement_id = $1 AND driver_id = $2 AND sender_id = $3
                    FOR UPDATE
                    "#,
                )
                .bind(key.announcement_id)
                .bind(key.driver_id)
                .bind(key.sender_id)
                .fetch_optional(&mut *conn)
                .await?
            }
        };

        Ok(record)
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            r#"
            SELECT id, announcement_id, driver_id, sender_id, message_count, created_at, last_activity_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, content), fields(content_len = content.len()))]
    async fn append_message(
        &self,
        target: AppendTarget,
        sender_id: Uuid,
        content: String,
    ) -> Result<(Conversation, ChatMessage)> {
        let mut tx = self.pool.begin().await?;

        let locked = match Self::lock_target(&mut *tx, target).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(AppError::ConversationNotFound),
            Err(AppError::Persistence(sqlx::Error::Database(e))) if e.code().as_deref() == Some("23503") => {
                // Foreign key violation: announcement or participant vanished since validation
                return Err(AppError::ConversationNotFound);
            }
            Err(e) => return Err(e),
        };

        let now = OffsetDateTime::now_utc();

        let conversation = sqlx::query_as::<_, ConversationRecord>(
            r#"
            UPDATE conversations
            SET message_count = message_count + 1, last_activity_at = $2
            WHERE id = $1
            RETURNING id, announcement_id, driver_id, sender_id, message_count, created_at, last_activity_at
            "#,
        )
        .bind(locked.id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let message = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO chat_messages (id, conversation_id, seq, sender_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, conversation_id, seq, sender_id, content, created_at, read_by_recipient
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(conversation.id)
        .bind(conversation.message_count)
        .bind(sender_id)
        .bind(content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((conversation.into(), message.into()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
            SET read_by_recipient = TRUE
            WHERE conversation_id = $1
              AND sender_id <> $2
              AND read_by_recipient = FALSE
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let records = sqlx::query_as::<_, ConversationSummaryRecord>(
            r#"
            SELECT c.id, c.announcement_id, a.start_location, a.end_location,
                   c.driver_id, d.first_name AS driver_first_name, d.last_name AS driver_last_name,
                   c.sender_id, s.first_name AS sender_first_name, s.last_name AS sender_last_name,
                   c.last_activity_at,
                   (
                       SELECT COUNT(*)
                       FROM chat_messages m
                       WHERE m.conversation_id = c.id
                         AND m.sender_id <> $1
                         AND m.read_by_recipient = FALSE
                   ) AS unread_count
            FROM conversations c
            JOIN announcements a ON a.id = c.announcement_id
            JOIN users d ON d.id = c.driver_id
            JOIN users s ON s.id = c.sender_id
            WHERE c.driver_id = $1 OR c.sender_id = $1
            ORDER BY c.last_activity_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<MessageView>> {
        let records = sqlx::query_as::<_, MessageViewRecord>(
            r#"
            SELECT m.id, m.conversation_id, m.seq, m.sender_id, m.content, m.created_at, m.read_by_recipient,
                   u.first_name AS sender_first_name, u.last_name AS sender_last_name
            FROM chat_messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.seq ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
