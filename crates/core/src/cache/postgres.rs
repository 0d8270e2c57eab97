//! Remote postgres cache backend (feature `postgres`).
//!
//! Lets several machines share one geocode cache. The table shape matches
//! the embedded backends; a read-only role simply leaves `ensure_table`
//! reporting absent and inserts failing, which upper layers tolerate.

use async_trait::async_trait;
use sqlx::PgPool;

use super::backend::{CacheBackend, TABLE_NAME};
use crate::Error;

#[derive(Debug)]
pub(crate) struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub(crate) async fn connect(url: &str) -> Result<Self, Error> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheBackend for PgBackend {
    async fn ensure_table(&self, create: bool) -> Result<bool, Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(TABLE_NAME)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            return Ok(true);
        }
        if !create {
            return Ok(false);
        }

        let created = sqlx::query("CREATE TABLE IF NOT EXISTS geocode_cache (url TEXT, body TEXT)")
            .execute(&self.pool)
            .await;
        if let Err(e) = created {
            tracing::warn!("cannot create geocode cache table: {e}");
            return Ok(false);
        }

        // Secondary index on the key column for lookup performance.
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_url_geocode_cache ON geocode_cache (url)")
            .execute(&self.pool)
            .await?;

        Ok(true)
    }

    async fn get(&self, url: &str) -> Result<Option<String>, Error> {
        let body = sqlx::query_scalar::<_, String>("SELECT body FROM geocode_cache WHERE url = $1 LIMIT 1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(body)
    }

    async fn put(&self, url: &str, body: &str) -> Result<(), Error> {
        sqlx::query("INSERT INTO geocode_cache (url, body) VALUES ($1, $2)")
            .bind(url)
            .bind(body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
