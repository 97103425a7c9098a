use crate::domain::user::{Role, User};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) role: String,
}

impl TryFrom<UserRecord> for User {
    type Error = sqlx::Error;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let role: Role = record.role.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self { id: record.id, first_name: record.first_name, last_name: record.last_name, role })
    }
}
