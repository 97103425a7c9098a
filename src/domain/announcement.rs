use uuid::Uuid;

/// Transport capacity posted by a driver; the origin context of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub start_location: String,
    pub end_location: String,
}
