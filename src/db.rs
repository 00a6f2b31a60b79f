use crate::db_storage::ImportJobStorage;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Worker runs touch one row at a time; a small pool is plenty.
const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Job store over this pool, with the jobs table created if missing.
    pub async fn job_storage(&self) -> anyhow::Result<ImportJobStorage> {
        let storage = ImportJobStorage::new(self.pool.clone());
        storage.ensure_schema().await?;
        Ok(storage)
    }
}
