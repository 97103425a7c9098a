use crate::domain::announcement::Announcement;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AnnouncementRecord {
    pub(crate) id: Uuid,
    pub(crate) driver_id: Uuid,
    pub(crate) start_location: String,
    pub(crate) end_location: String,
}

impl From<AnnouncementRecord> for Announcement {
    fn from(record: AnnouncementRecord) -> Self {
        Self {
            id: record.id,
            driver_id: record.driver_id,
            start_location: record.start_location,
            end_location: record.end_location,
        }
    }
}
