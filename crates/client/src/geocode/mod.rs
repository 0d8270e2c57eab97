//! Geocoding sessions.
//!
//! A session ties the triad together: the URL-keyed response cache, the
//! process-wide query throttle, and the XML result translator, around one
//! external HTTP fetch.
//!
//! ### Request flow
//!
//! - Build the canonical lookup URL from the session's query template
//!   (escaped query text plus static extra parameters).
//! - Serve from the cache when reading is enabled; a hit skips throttling
//!   and the network entirely.
//! - On a miss, gate on the service's throttle slot, fetch once (the live
//!   URL may carry the per-user email parameter; the cache key never
//!   does), store the body best-effort, and translate.
//!
//! ### Terms of use
//!
//! Note: most online geocoding services have terms of use. Requests to the
//! well-known Nominatim instances are spaced at least one configured
//! interval apart, but other restrictions may apply that you must follow
//! by other means.

mod request;
mod response;

pub use request::GeocodeRequest;
pub use response::{FieldDef, FieldType, FieldValue, Geometry, ResultRow, ResultSet, translate};

use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use gazetteer_core::config::expand_query_template;
use gazetteer_core::{CacheStore, Error, Locator, SessionConfig, SessionOptions};

use crate::fetch::{Fetcher, HttpFetcher};
use crate::throttle::QueryThrottle;

/// Characters escaped in values interpolated into request URLs.
const URL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A geocoding session: resolved configuration, cache store, throttle
/// handle, and transport.
///
/// Sessions are safe to share across tasks (`&self` methods); dropping the
/// session releases its cache backend and transport.
pub struct GeocodeSession {
    config: SessionConfig,
    cache: CacheStore,
    throttle: Arc<QueryThrottle>,
    fetcher: Arc<dyn Fetcher>,
}

impl GeocodeSession {
    /// Create a session from explicit options, the `GEOCODE_*`
    /// environment, and built-in defaults.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error — unusable cache locator, missing
    /// or malformed query template — with no partial effect.
    pub fn new(options: SessionOptions) -> Result<Self, Error> {
        let config = SessionConfig::resolve(options)?;
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.application)?);
        Self::with_parts(config, fetcher)
    }

    /// Create a session with a custom transport.
    pub fn with_fetcher(options: SessionOptions, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let config = SessionConfig::resolve(options)?;
        Self::with_parts(config, fetcher)
    }

    fn with_parts(config: SessionConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let locator = Locator::parse(&config.cache_file)?;
        Ok(Self {
            config,
            cache: CacheStore::new(locator),
            throttle: QueryThrottle::global(),
            fetcher,
        })
    }

    /// The session's resolved configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run one geocoding request.
    ///
    /// An empty result set means the service found nothing; an error means
    /// the request could not be made or the answer not understood — the
    /// two are never conflated.
    pub async fn geocode(&self, request: &GeocodeRequest) -> Result<ResultSet, Error> {
        let query = request.validate()?;

        let url = self.canonical_url(query);

        if self.config.read_cache {
            if let Some(body) = self.cache.get(&url).await {
                tracing::debug!("geocode cache hit for {url}");
                return translate(&body);
            }
        }

        self.throttle.acquire(&self.config.service, self.config.delay()).await;

        let body = self.fetcher.fetch(&self.fetch_url(&url)).await?;

        if self.config.write_cache && !body.is_empty() {
            if let Err(e) = self.cache.put(&url, &body).await {
                tracing::warn!("geocode cache write failed: {e}");
            }
        }

        translate(&body)
    }

    /// Canonical request URL — the cache key.
    ///
    /// Deliberately excludes the per-user email parameter so that
    /// switching identifiers neither fragments the cache nor leaks the
    /// identifier into stored keys.
    fn canonical_url(&self, query: &str) -> String {
        let escaped = utf8_percent_encode(query, URL_ESCAPE).to_string();
        let template = self.config.query_template.as_deref().unwrap_or_default();
        let mut url = expand_query_template(template, &escaped);
        if let Some(extra) = &self.config.extra_query_parameters {
            url.push('&');
            url.push_str(extra);
        }
        url
    }

    /// URL used for the live network request only.
    fn fetch_url(&self, canonical: &str) -> String {
        match &self.config.email {
            Some(email) if self.config.service.accepts_email() => {
                let escaped = utf8_percent_encode(email, URL_ESCAPE);
                format!("{canonical}&email={escaped}")
            }
            _ => canonical.to_string(),
        }
    }
}
