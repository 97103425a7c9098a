use crate::domain::conversation::{Conversation, ConversationSummary, Participant, Route};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ConversationRecord {
    pub(crate) id: Uuid,
    pub(crate) announcement_id: Uuid,
    pub(crate) driver_id: Uuid,
    pub(crate) sender_id: Uuid,
    pub(crate) message_count: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) last_activity_at: OffsetDateTime,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            announcement_id: record.announcement_id,
            driver_id: record.driver_id,
            sender_id: record.sender_id,
            message_count: record.message_count,
            created_at: record.created_at,
            last_activity_at: record.last_activity_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ConversationSummaryRecord {
    pub(crate) id: Uuid,
    pub(crate) announcement_id: Uuid,
    pub(crate) start_location: String,
    pub(crate) end_location: String,
    pub(crate) driver_id: Uuid,
    pub(crate) driver_first_name: String,
    pub(crate) driver_last_name: String,
    pub(crate) sender_id: Uuid,
    pub(crate) sender_first_name: String,
    pub(crate) sender_last_name: String,
    pub(crate) last_activity_at: OffsetDateTime,
    pub(crate) unread_count: i64,
}

impl From<ConversationSummaryRecord> for ConversationSummary {
    fn from(record: ConversationSummaryRecord) -> Self {
        Self {
            id: record.id,
            announcement_id: record.announcement_id,
            route: Route { start_location: record.start_location, end_location: record.end_location },
            driver: Participant {
                id: record.driver_id,
                display_name: format!("{} {}", record.driver_first_name, record.driver_last_name),
            },
            sender: Participant {
                id: record.sender_id,
                display_name: format!("{} {}", record.sender_first_name, record.sender_last_name),
            },
            last_activity_at: record.last_activity_at,
            unread_count: record.unread_count,
        }
    }
}
