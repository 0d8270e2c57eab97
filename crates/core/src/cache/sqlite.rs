//! Embedded sqlite cache backend.
//!
//! Wraps a tokio-rusqlite connection that runs database operations on a
//! background thread. The cache holds disposable data, so durability is
//! traded away (`synchronous=OFF`) in favor of write speed.

use std::path::Path;

use async_trait::async_trait;
use tokio_rusqlite::rusqlite::{self, OpenFlags};
use tokio_rusqlite::{Connection, params};

use super::backend::{CacheBackend, TABLE_NAME};
use crate::Error;

#[derive(Clone, Debug)]
pub(crate) struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open a cache database at the given path.
    ///
    /// With `create` false the file must already exist; with `create` true
    /// it is created on demand (the path `:memory:` yields a database that
    /// lives only as long as the connection).
    pub(crate) async fn open(path: &Path, create: bool) -> Result<Self, Error> {
        let conn = if create {
            Connection::open(path).await.map_err(|e| Error::Database(e.into()))?
        } else {
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            Connection::open_with_flags(path, flags)
                .await
                .map_err(|e| Error::Database(e.into()))?
        };

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=OFF;
                 PRAGMA temp_store=MEMORY;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for SqliteBackend {
    async fn ensure_table(&self, create: bool) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                    params![TABLE_NAME],
                    |row| row.get(0),
                )?;
                if exists {
                    return Ok(true);
                }
                if !create {
                    return Ok(false);
                }
                // Secondary index on the key column for lookup performance.
                let created = conn.execute_batch(
                    "CREATE TABLE geocode_cache (url TEXT, body TEXT);
                     CREATE INDEX idx_url_geocode_cache ON geocode_cache(url);",
                );
                match created {
                    Ok(()) => Ok(true),
                    Err(e) => {
                        tracing::warn!("cannot create geocode cache table: {e}");
                        Ok(false)
                    }
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, url: &str) -> Result<Option<String>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT body FROM geocode_cache WHERE url = ?1 ORDER BY rowid LIMIT 1")?;

                let result = stmt.query_row(params![url], |row| row.get::<_, String>(0));

                match result {
                    Ok(body) => Ok(Some(body)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, url: &str, body: &str) -> Result<(), Error> {
        let url = url.to_string();
        let body = body.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("INSERT INTO geocode_cache (url, body) VALUES (?1, ?2)", params![url, body])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let backend = SqliteBackend::open(Path::new(":memory:"), true).await.unwrap();
        assert!(backend.ensure_table(true).await.unwrap());

        backend.put("https://example.com/search?q=paris", "<searchresults/>").await.unwrap();
        let body = backend.get("https://example.com/search?q=paris").await.unwrap();
        assert_eq!(body.as_deref(), Some("<searchresults/>"));
    }

    #[tokio::test]
    async fn test_ensure_table_idempotent_and_absent_without_create() {
        let backend = SqliteBackend::open(Path::new(":memory:"), true).await.unwrap();
        assert!(!backend.ensure_table(false).await.unwrap());
        assert!(backend.ensure_table(true).await.unwrap());
        assert!(backend.ensure_table(true).await.unwrap());
        assert!(backend.ensure_table(false).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_keys_first_match_wins() {
        let backend = SqliteBackend::open(Path::new(":memory:"), true).await.unwrap();
        backend.ensure_table(true).await.unwrap();

        backend.put("u", "first").await.unwrap();
        backend.put("u", "second").await.unwrap();

        assert_eq!(backend.get("u").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let backend = SqliteBackend::open(Path::new(":memory:"), true).await.unwrap();
        backend.ensure_table(true).await.unwrap();
        assert!(backend.get("absent").await.unwrap().is_none());
    }
}
