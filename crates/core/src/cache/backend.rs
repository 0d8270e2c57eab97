//! The storage capability interface and backend selection.

use std::sync::Arc;

use async_trait::async_trait;

use super::locator::{self, Locator};
use crate::Error;

/// Name of the key/payload table in every backend.
pub(crate) const TABLE_NAME: &str = "geocode_cache";

/// Key column: the canonical request URL.
pub(crate) const FIELD_URL: &str = "url";

/// Payload column: the raw response body, opaque to the cache.
pub(crate) const FIELD_BODY: &str = "body";

/// Capability interface implemented by every cache storage backend.
#[async_trait]
pub(crate) trait CacheBackend: Send + Sync + std::fmt::Debug {
    /// Ensure the url/body table exists.
    ///
    /// Returns `Ok(false)` when the table is absent and was not (or could
    /// not be) created; existing tables never fail.
    async fn ensure_table(&self, create: bool) -> Result<bool, Error>;

    /// Exact-match lookup by URL. At most one record is consulted; the
    /// earliest match wins when duplicates exist.
    async fn get(&self, url: &str) -> Result<Option<String>, Error>;

    /// Append-only insert. A second write for the same URL is accepted
    /// and may create a duplicate record.
    async fn put(&self, url: &str, body: &str) -> Result<(), Error>;
}

/// Open a single locator candidate.
async fn open_one(locator: &Locator, create: bool) -> Result<Arc<dyn CacheBackend>, Error> {
    match locator {
        Locator::Sqlite(path) => {
            #[cfg(feature = "sqlite")]
            {
                return Ok(Arc::new(super::sqlite::SqliteBackend::open(path, create).await?));
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = create;
                return Err(Error::BackendUnavailable(format!(
                    "sqlite backend not enabled for {}",
                    path.display()
                )));
            }
        }
        Locator::FlatFile(path) => Ok(Arc::new(super::flatfile::FlatFileBackend::open(path.clone(), create).await?)),
        Locator::Postgres(url) => {
            #[cfg(feature = "postgres")]
            {
                return Ok(Arc::new(super::postgres::PgBackend::connect(url).await?));
            }
            #[cfg(not(feature = "postgres"))]
            {
                return Err(Error::BackendUnavailable(format!("postgres backend not enabled for {url}")));
            }
        }
        Locator::Memory => Ok(Arc::new(super::memory::MemoryBackend::new())),
    }
}

/// Walk the locator's fallback chain and open the first usable backend.
///
/// Substitutions are logged but never fatal; `None` means every candidate
/// failed.
pub(crate) async fn open_with_fallback(
    locator: &Locator, create: bool,
) -> Option<(Locator, Arc<dyn CacheBackend>)> {
    for (candidate, may_create) in locator::fallback_chain(locator, create) {
        match open_one(&candidate, may_create).await {
            Ok(backend) => {
                if candidate != *locator {
                    tracing::warn!("switching geocode cache to {candidate}");
                }
                return Some((candidate, backend));
            }
            Err(e) => {
                tracing::debug!("cache backend {candidate} unavailable: {e}");
            }
        }
    }
    None
}
