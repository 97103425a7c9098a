use crate::domain::announcement::Announcement;
use crate::error::Result;
use crate::storage::DbPool;
use crate::storage::records::AnnouncementRecord;
use async_trait::async_trait;
use uuid::Uuid;

/// Lookup of the transport announcements a conversation can be about.
#[async_trait]
pub trait TransportDirectory: Send + Sync + std::fmt::Debug {
    async fn find_announcement(&self, announcement_id: Uuid) -> Result<Option<Announcement>>;
}

#[derive(Clone, Debug)]
pub struct PgTransportDirectory {
    pool: DbPool,
}

impl PgTransportDirectory {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransportDirectory for PgTransportDirectory {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_announcement(&self, announcement_id: Uuid) -> Result<Option<Announcement>> {
        let record = sqlx::query_as::<_, AnnouncementRecord>(
            r#"
            SELECT id, driver_id, start_location, end_location
            FROM announcements
            WHERE id = $1
            "#,
        )
        .bind(announcement_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }
}
