//! In-process cache backend.
//!
//! Last resort of the fallback chain (and handy for tests): a plain table
//! of `(url, body)` pairs that disappears with the session.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::backend::CacheBackend;
use crate::Error;

#[derive(Debug, Default)]
pub(crate) struct MemoryBackend {
    rows: Mutex<Vec<(String, String)>>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn ensure_table(&self, _create: bool) -> Result<bool, Error> {
        Ok(true)
    }

    async fn get(&self, url: &str) -> Result<Option<String>, Error> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|(key, _)| key == url).map(|(_, body)| body.clone()))
    }

    async fn put(&self, url: &str, body: &str) -> Result<(), Error> {
        let mut rows = self.rows.lock().await;
        rows.push((url.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_first_match() {
        let backend = MemoryBackend::new();
        backend.put("u", "first").await.unwrap();
        backend.put("u", "second").await.unwrap();

        assert_eq!(backend.get("u").await.unwrap().as_deref(), Some("first"));
        assert!(backend.get("missing").await.unwrap().is_none());
    }
}
