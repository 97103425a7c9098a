use crate::domain::message::{ChatMessage, MessageView};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) conversation_id: Uuid,
    pub(crate) seq: i64,
    pub(crate) sender_id: Uuid,
    pub(crate) content: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) read_by_recipient: bool,
}

impl From<MessageRecord> for ChatMessage {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            conversation_id: record.conversation_id,
            seq: record.seq,
            sender_id: record.sender_id,
            content: record.content,
            created_at: record.created_at,
            read_by_recipient: record.read_by_recipient,
        }
    }
}

/// Message joined with its author's name.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageViewRecord {
    #[sqlx(flatten)]
    pub(crate) message: MessageRecord,
    pub(crate) sender_first_name: String,
    pub(crate) sender_last_name: String,
}

impl From<MessageViewRecord> for MessageView {
    fn from(record: MessageViewRecord) -> Self {
        let name = format!("{} {}", record.sender_first_name, record.sender_last_name);
        ChatMessage::from(record.message).into_view(name)
    }
}
