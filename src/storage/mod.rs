use crate::config::DatabaseConfig;
use backon::{ExponentialBuilder, Retryable};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub mod announcement_repo;
pub mod conversation_repo;
pub(crate) mod records;
pub mod user_repo;

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool, retrying with exponential backoff while the database comes up.
///
/// # Errors
/// Returns `sqlx::Error` if every connection attempt fails.
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let retry_strategy = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(config.connect_retries);

    (|| async {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
    })
    .retry(retry_strategy)
    .notify(|e, duration| {
        tracing::warn!(error = %e, retry_in = ?duration, "Database connection failed, retrying");
    })
    .await
}
