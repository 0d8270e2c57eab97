//! Geocoding session configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Explicit per-session options (highest)
//! 2. Environment variables (GEOCODE_*)
//! 3. TOML config file (if GEOCODE_CONFIG_FILE set)
//! 4. Built-in defaults
//!
//! The resolved [`SessionConfig`] is immutable for the session's lifetime.

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Default query template for the OpenStreetMap Nominatim service.
pub const OSM_NOMINATIM_QUERY: &str =
    "https://nominatim.openstreetmap.org/search?q=%s&format=xml&polygon_text=1&addressdetails=1";

/// Default query template for the MapQuest-hosted Nominatim service.
pub const MAPQUEST_NOMINATIM_QUERY: &str =
    "https://open.mapquestapi.com/nominatim/v1/search.php?q=%s&format=xml&addressdetails=1";

/// A geocoding service, identified by name.
///
/// Known services carry a built-in query template and a centrally-enforced
/// usage policy (request throttling); anything else is treated as a custom
/// endpoint with no throttling and no template default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Service {
    /// The public OpenStreetMap Nominatim instance ("OSM_NOMINATIM").
    OsmNominatim,
    /// The MapQuest-hosted Nominatim instance ("MAPQUEST_NOMINATIM").
    MapQuestNominatim,
    /// Any other service name; fail-open, no throttling.
    Custom(String),
}

impl From<String> for Service {
    fn from(name: String) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "OSM_NOMINATIM" => Service::OsmNominatim,
            "MAPQUEST_NOMINATIM" => Service::MapQuestNominatim,
            _ => Service::Custom(name),
        }
    }
}

impl From<Service> for String {
    fn from(service: Service) -> Self {
        service.name().to_string()
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Service {
    /// Canonical name of the service.
    pub fn name(&self) -> &str {
        match self {
            Service::OsmNominatim => "OSM_NOMINATIM",
            Service::MapQuestNominatim => "MAPQUEST_NOMINATIM",
            Service::Custom(name) => name,
        }
    }

    /// Built-in query template, if this service has one.
    pub fn default_query_template(&self) -> Option<&'static str> {
        match self {
            Service::OsmNominatim => Some(OSM_NOMINATIM_QUERY),
            Service::MapQuestNominatim => Some(MAPQUEST_NOMINATIM_QUERY),
            Service::Custom(_) => None,
        }
    }

    /// Whether outbound requests to this service are rate-limited.
    ///
    /// Custom services are assumed to have no centrally-enforced limit.
    pub fn is_throttled(&self) -> bool {
        !matches!(self, Service::Custom(_))
    }

    /// Whether this service understands a per-user `email` parameter.
    pub fn accepts_email(&self) -> bool {
        matches!(self, Service::OsmNominatim)
    }
}

/// Explicit per-session options.
///
/// Every field is optional; unset fields fall back to `GEOCODE_*`
/// environment variables, the optional TOML config file, and finally the
/// built-in defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionOptions {
    /// Cache locator: a `.sqlite` path, `.csv` path, `postgres://` URL,
    /// or `:memory:`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,

    /// Serve repeated queries from the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_cache: Option<bool>,

    /// Store fetched responses in the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_cache: Option<bool>,

    /// Service name, e.g. "OSM_NOMINATIM".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Contact email, forwarded to services that want one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Application identifier; becomes the User-Agent header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,

    /// Minimum delay between two consecutive queries, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<f64>,

    /// URL template for GET requests; must contain exactly one `%s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_template: Option<String>,

    /// Additional static parameters appended to the GET request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_query_parameters: Option<String>,
}

/// Resolved, validated session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cache locator (see [`SessionOptions::cache_file`]).
    #[serde(default = "default_cache_file")]
    pub cache_file: String,

    /// Serve repeated queries from the cache (default true).
    #[serde(default = "default_true")]
    pub read_cache: bool,

    /// Store fetched responses in the cache (default true).
    #[serde(default = "default_true")]
    pub write_cache: bool,

    /// Target geocoding service (default OSM Nominatim).
    #[serde(default = "default_service")]
    pub service: Service,

    /// Contact email; appended to the fetch URL for services that accept
    /// it, never part of the cache key.
    #[serde(default)]
    pub email: Option<String>,

    /// Application identifier sent as the User-Agent header.
    #[serde(default = "default_application")]
    pub application: String,

    /// Minimum delay between two consecutive queries, in seconds
    /// (default 1.0).
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// URL query template; defaulted from the service when unset.
    #[serde(default)]
    pub query_template: Option<String>,

    /// Additional static query parameters, appended verbatim.
    #[serde(default)]
    pub extra_query_parameters: Option<String>,
}

fn default_cache_file() -> String {
    #[cfg(feature = "sqlite")]
    {
        crate::cache::locator::DEFAULT_CACHE_SQLITE.to_string()
    }
    #[cfg(not(feature = "sqlite"))]
    {
        crate::cache::locator::DEFAULT_CACHE_CSV.to_string()
    }
}

fn default_true() -> bool {
    true
}

fn default_service() -> Service {
    Service::OsmNominatim
}

fn default_application() -> String {
    concat!("gazetteer/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_delay_secs() -> f64 {
    1.0
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
            read_cache: true,
            write_cache: true,
            service: default_service(),
            email: None,
            application: default_application(),
            delay_secs: default_delay_secs(),
            query_template: None,
            extra_query_parameters: None,
        }
    }
}

impl SessionConfig {
    /// Minimum delay as a Duration for use with tokio.
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs)
    }

    /// Resolve a configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Explicit `options`
    /// 2. Environment variables prefixed with `GEOCODE_`
    /// 3. TOML file from `GEOCODE_CONFIG_FILE` (if set)
    /// 4. Built-in defaults via `Default::default()`
    ///
    /// An unset query template is filled in from the service's built-in
    /// template before validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or parsed, or if
    /// validation fails after loading (unusable cache locator, missing or
    /// malformed query template, out-of-range delay).
    pub fn resolve(options: SessionOptions) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GEOCODE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment
            .merge(Env::prefixed("GEOCODE_").map(|key| key.as_str().to_lowercase().into()))
            .merge(Serialized::defaults(options));

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        if config.query_template.is_none() {
            config.query_template = config.service.default_query_template().map(str::to_string);
        }

        config.validate()?;

        Ok(config)
    }
}

/// Expand a validated query template, substituting `value` for the single
/// `%s` placeholder and collapsing `%%` escapes.
pub fn expand_query_template(template: &str, value: &str) -> String {
    let mut out = String::with_capacity(template.len() + value.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                Some('s') => {
                    chars.next();
                    out.push_str(value);
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}
