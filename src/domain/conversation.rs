use crate::domain::user::{Role, User};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A chat between one driver and one sender about a single announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub announcement_id: Uuid,
    pub driver_id: Uuid,
    pub sender_id: Uuid,
    pub message_count: i64,
    pub created_at: OffsetDateTime,
    pub last_activity_at: OffsetDateTime,
}

impl Conversation {
    #[must_use]
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.driver_id == user_id || self.sender_id == user_id
    }

    /// Returns the other participant, or `None` if `user_id` is not part of the conversation.
    #[must_use]
    pub fn counterparty_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.driver_id {
            Some(self.sender_id)
        } else if user_id == self.sender_id {
            Some(self.driver_id)
        } else {
            None
        }
    }
}

/// Natural key of a conversation: the participant pair in their fixed roles plus the origin announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub announcement_id: Uuid,
    pub driver_id: Uuid,
    pub sender_id: Uuid,
}

impl ConversationKey {
    /// Assigns the driver and sender slots from the caller's role.
    ///
    /// Returns `None` when the two users do not form a driver/sender pair.
    #[must_use]
    pub fn for_pair(caller: &User, counterparty: &User, announcement_id: Uuid) -> Option<Self> {
        if caller.id == counterparty.id || caller.role.counterpart() != Some(counterparty.role) {
            return None;
        }

        let (driver_id, sender_id) = match caller.role {
            Role::Driver => (caller.id, counterparty.id),
            Role::Sender => (counterparty.id, caller.id),
            Role::Admin => return None,
        };

        Some(Self { announcement_id, driver_id, sender_id })
    }
}

/// Where a new message should be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendTarget {
    Existing(Uuid),
    /// Find-or-create by natural key.
    Keyed(ConversationKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub start_location: String,
    pub end_location: String,
}

/// Chat list entry as seen by one of the participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub announcement_id: Uuid,
    pub route: Route,
    pub driver: Participant,
    pub sender: Participant,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    pub unread_count: i64,
}
