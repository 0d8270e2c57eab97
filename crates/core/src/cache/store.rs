//! The URL-keyed cache store.
//!
//! `CacheStore` owns the lazily-initialized backend handle behind a mutex;
//! the open-or-create critical section additionally serializes on one
//! process-wide lock so concurrent sessions never race backend
//! initialization against the same location. Reads are strictly
//! best-effort: every backend failure degrades to a cache miss.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::backend::{self, CacheBackend};
use super::locator::Locator;
use crate::Error;

/// Guards backend open/create across all stores in the process.
static OPEN_LOCK: Mutex<()> = Mutex::const_new(());

/// Persistent, URL-keyed storage of raw response bodies.
#[derive(Debug)]
pub struct CacheStore {
    state: Mutex<StoreState>,
}

#[derive(Debug)]
struct StoreState {
    locator: Locator,
    backend: Option<Arc<dyn CacheBackend>>,
}

impl CacheStore {
    /// Create a store for the given locator. No backend is opened until
    /// the first read or write.
    pub fn new(locator: Locator) -> Self {
        Self { state: Mutex::new(StoreState { locator, backend: None }) }
    }

    /// The store's current locator, reflecting any fallback substitution.
    pub async fn locator(&self) -> Locator {
        self.state.lock().await.locator.clone()
    }

    /// Exact-match lookup by canonical request URL.
    ///
    /// Any failure — missing backend, missing table, read error — is a
    /// cache miss, logged at most as a warning.
    pub async fn get(&self, url: &str) -> Option<String> {
        let backend = self.backend(false).await?;

        match backend.ensure_table(false).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!("geocode cache unreadable: {e}");
                return None;
            }
        }

        match backend.get(url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("geocode cache read failed: {e}");
                None
            }
        }
    }

    /// Best-effort insert of a fetched response body.
    ///
    /// Failures are reported to the caller, which is expected to log and
    /// carry on; a failed cache write never aborts a geocode call.
    pub async fn put(&self, url: &str, body: &str) -> Result<(), Error> {
        let backend = self
            .backend(true)
            .await
            .ok_or_else(|| Error::BackendUnavailable("no cache backend could be opened".into()))?;

        if !backend.ensure_table(true).await? {
            return Err(Error::BackendUnavailable("cache table cannot be created".into()));
        }

        backend.put(url, body).await
    }

    /// The open backend handle, opening it on first use.
    ///
    /// With `create` false, a location that does not exist yet simply
    /// yields `None` and is re-probed by a later creating call.
    async fn backend(&self, create: bool) -> Option<Arc<dyn CacheBackend>> {
        let mut state = self.state.lock().await;
        if state.backend.is_none() {
            let _guard = OPEN_LOCK.lock().await;
            let (locator, backend) = backend::open_with_fallback(&state.locator, create).await?;
            if locator != state.locator {
                state.locator = locator;
            }
            state.backend = Some(backend);
        }
        state.backend.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::super::locator::{DEFAULT_CACHE_CSV, DEFAULT_CACHE_SQLITE};
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let store = CacheStore::new(Locator::Memory);
        assert!(store.get("u").await.is_none());

        store.put("u", "<searchresults/>").await.unwrap();
        assert_eq!(store.get("u").await.as_deref(), Some("<searchresults/>"));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_round_trip_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::Sqlite(dir.path().join("cache.sqlite"));

        let store = CacheStore::new(locator.clone());
        assert!(store.get("u").await.is_none());
        store.put("u", "body").await.unwrap();
        assert_eq!(store.get("u").await.as_deref(), Some("body"));

        // A fresh store over the same file sees the record.
        let reopened = CacheStore::new(locator);
        assert_eq!(reopened.get("u").await.as_deref(), Some("body"));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_default_sqlite_falls_back_to_existing_sibling_csv() {
        let dir = tempfile::tempdir().unwrap();

        // A previously degraded session left a flat-file cache behind.
        let csv_store = CacheStore::new(Locator::FlatFile(dir.path().join(DEFAULT_CACHE_CSV)));
        csv_store.put("u", "from-csv").await.unwrap();

        let store = CacheStore::new(Locator::Sqlite(dir.path().join(DEFAULT_CACHE_SQLITE)));
        assert_eq!(store.get("u").await.as_deref(), Some("from-csv"));
        assert!(matches!(store.locator().await, Locator::FlatFile(_)));
    }

    #[tokio::test]
    async fn test_flat_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(Locator::FlatFile(dir.path().join("cache.csv")));

        store.put("u", "body").await.unwrap();
        assert_eq!(store.get("u").await.as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn test_duplicate_writes_resolve_to_earliest() {
        let store = CacheStore::new(Locator::Memory);
        store.put("u", "first").await.unwrap();
        store.put("u", "second").await.unwrap();
        assert_eq!(store.get("u").await.as_deref(), Some("first"));
    }
}
