//! Unified error types for the gazetteer workspace.
//!
//! Cache backends convert their failures into these variants; whether a
//! failure propagates or degrades (cache read → miss, cache write → logged
//! warning) is decided by the caller, not here.

use crate::config::ConfigError;

#[cfg(feature = "sqlite")]
use tokio_rusqlite::rusqlite;

/// Unified error type for geocoding sessions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid geocode request (both query forms set, or neither).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Structured (per-field) queries are recognized but not implemented.
    #[error("structured queries are not supported")]
    StructuredQueryUnsupported,

    /// Session configuration failed to resolve or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Embedded cache database operation failed.
    #[cfg(feature = "sqlite")]
    #[error("cache database error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Remote cache database operation failed.
    #[cfg(feature = "postgres")]
    #[error("cache database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Flat-file or in-memory cache backend operation failed.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// No cache backend could be opened or created for the session locator.
    #[error("cache backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Network-level fetch failure.
    #[error("network error: {0}")]
    Network(String),

    /// Fetch timed out.
    #[error("request timeout")]
    Timeout,

    /// Service answered with a non-success HTTP status.
    #[error("HTTP error: {status}")]
    HttpStatus { status: u16 },

    /// Response body is not well-formed markup.
    #[error("malformed response: {0}")]
    Parse(String),

    /// Response parsed but contains no recognizable results container.
    #[error("response has no results container")]
    MissingResults,
}

#[cfg(feature = "sqlite")]
impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidQuery("neither form set".to_string());
        assert!(err.to_string().contains("invalid query"));

        let err = Error::HttpStatus { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_structured_query_message_names_the_limitation() {
        let err = Error::StructuredQueryUnsupported;
        assert!(err.to_string().contains("not supported"));
    }
}
