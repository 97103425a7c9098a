use crate::domain::conversation::Participant;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// 1-based position within the conversation.
    pub seq: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub read_by_recipient: bool,
}

impl ChatMessage {
    #[must_use]
    pub fn into_view(self, sender_name: String) -> MessageView {
        MessageView {
            id: self.id,
            seq: self.seq,
            sender: Participant { id: self.sender_id, display_name: sender_name },
            content: self.content,
            created_at: self.created_at,
            read: self.read_by_recipient,
        }
    }
}

/// Message enriched with the author's display data, as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub seq: i64,
    pub sender: Participant,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub read: bool,
}
