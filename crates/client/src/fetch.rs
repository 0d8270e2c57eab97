//! HTTP fetch collaborator.
//!
//! One best-effort GET per geocode miss: no retries, no redirect policy
//! beyond reqwest's defaults. The session talks to the network through the
//! [`Fetcher`] trait so transports can be swapped (and counted) in tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use gazetteer_core::Error;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A transport capable of fetching one URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL, returning the response body on success.
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}

/// reqwest-backed fetcher used by real sessions.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher identifying itself with the given User-Agent.
    pub fn new(user_agent: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(DEFAULT_TIMEOUT)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { Error::Timeout } else { Error::Network(e.to_string()) })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus { status: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        tracing::debug!("fetched {} in {:?} ({} bytes)", url, start.elapsed(), body.len());

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_builds() {
        assert!(HttpFetcher::new("gazetteer-tests/0.1").is_ok());
    }
}
