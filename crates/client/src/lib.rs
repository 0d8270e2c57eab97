//! Geocoding client for gazetteer.
//!
//! A caching, rate-limited client for Nominatim-style XML geocoding
//! services: free-text place query in, structured candidate locations
//! (name, address components, coordinates, optional polygon) out.
//! Repeated identical queries are served from a persistent cache, and
//! outbound queries to well-known services are throttled to respect their
//! usage policies.
//!
//! ```no_run
//! use gazetteer_client::{GeocodeRequest, GeocodeSession, SessionOptions};
//!
//! # async fn run() -> Result<(), gazetteer_client::Error> {
//! let session = GeocodeSession::new(SessionOptions::default())?;
//! let results = session.geocode(&GeocodeRequest::text("Paris, France")).await?;
//! for (i, row) in results.rows().iter().enumerate() {
//!     println!("{:?} {:?}", results.value(i, "display_name"), row.geometry());
//! }
//! # Ok(())
//! # }
//! ```

pub mod fetch;
pub mod geocode;
pub mod throttle;

pub use fetch::{Fetcher, HttpFetcher};
pub use geocode::{
    FieldDef, FieldType, FieldValue, GeocodeRequest, GeocodeSession, Geometry, ResultRow, ResultSet,
    translate,
};
pub use throttle::QueryThrottle;

pub use gazetteer_core::{ConfigError, Error, Service, SessionConfig, SessionOptions};
