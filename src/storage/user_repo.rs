use crate::domain::user::User;
use crate::error::Result;
use crate::storage::DbPool;
use crate::storage::records::UserRecord;
use async_trait::async_trait;
use uuid::Uuid;

/// Read access to the marketplace's user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;
}

#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, first_name, last_name, role
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }
}
