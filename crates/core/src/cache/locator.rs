//! Cache locator parsing and the backend fallback policy.
//!
//! A locator is the session's `cache_file` string, resolved to a concrete
//! storage technology by extension or prefix. The fallback chain encodes
//! which substitute locations may be tried when the named one cannot be
//! opened, as an ordered candidate list rather than nested retries.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Default cache file for the embedded-database backend.
pub const DEFAULT_CACHE_SQLITE: &str = "geocode_cache.sqlite";

/// Default cache file for the flat-file backend.
pub const DEFAULT_CACHE_CSV: &str = "geocode_cache.csv";

/// A parsed cache locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Embedded sqlite database (`.sqlite` extension, or the `:memory:`
    /// path for the in-memory fallback).
    Sqlite(PathBuf),
    /// Delimited flat file (`.csv` extension).
    FlatFile(PathBuf),
    /// Remote database connection string (`postgres://` prefix).
    Postgres(String),
    /// In-process table, lost when the session ends.
    Memory,
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Sqlite(path) | Locator::FlatFile(path) => write!(f, "{}", path.display()),
            Locator::Postgres(url) => f.write_str(url),
            Locator::Memory => f.write_str(":memory:"),
        }
    }
}

impl Locator {
    /// Parse a cache locator string.
    ///
    /// Recognizes `.sqlite` and `.csv` paths, `postgres://` /
    /// `postgresql://` connection strings, and `:memory:`. A default-named
    /// sqlite locator is substituted with its sibling flat file when the
    /// crate is built without the `sqlite` feature.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for unrecognized locators and for
    /// technologies the crate was built without.
    pub fn parse(locator: &str) -> Result<Self, ConfigError> {
        let locator = locator.trim();
        if locator == ":memory:" {
            return Ok(Locator::Memory);
        }

        if locator.starts_with("postgres://") || locator.starts_with("postgresql://") {
            if cfg!(feature = "postgres") {
                return Ok(Locator::Postgres(locator.to_string()));
            }
            return Err(ConfigError::Invalid {
                field: "cache_file".into(),
                reason: "postgres locators require building with the postgres feature".into(),
            });
        }

        let path = Path::new(locator);
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "sqlite" => {
                if cfg!(feature = "sqlite") {
                    Ok(Locator::Sqlite(path.to_path_buf()))
                } else if path.file_name() == Some(OsStr::new(DEFAULT_CACHE_SQLITE)) {
                    // The preferred technology is not compiled in; fall
                    // back to the flat-file default next to it.
                    tracing::debug!("sqlite backend not enabled, using {DEFAULT_CACHE_CSV}");
                    Ok(Locator::FlatFile(path.with_file_name(DEFAULT_CACHE_CSV)))
                } else {
                    Err(ConfigError::Invalid {
                        field: "cache_file".into(),
                        reason: "sqlite locators require building with the sqlite feature".into(),
                    })
                }
            }
            "csv" => Ok(Locator::FlatFile(path.to_path_buf())),
            _ => Err(ConfigError::Invalid {
                field: "cache_file".into(),
                reason: "only .sqlite, .csv, postgres:// or :memory: locators are supported".into(),
            }),
        }
    }

    /// The default-named flat-file sibling of a default-named sqlite
    /// locator, if any.
    ///
    /// An earlier degraded session may have written the cache there; reads
    /// and writes follow it rather than re-probing the sqlite file.
    fn default_sibling_flat_file(&self) -> Option<Locator> {
        match self {
            Locator::Sqlite(path) if path.file_name() == Some(OsStr::new(DEFAULT_CACHE_SQLITE)) => {
                Some(Locator::FlatFile(path.with_file_name(DEFAULT_CACHE_CSV)))
            }
            _ => None,
        }
    }
}

/// Ordered `(candidate, may_create)` open attempts for a locator.
///
/// The first candidate that opens wins and is persisted as the store's
/// locator. On-disk creation failures degrade to an in-memory location of
/// the same technology; remote locators get a single attempt.
pub(crate) fn fallback_chain(locator: &Locator, create: bool) -> Vec<(Locator, bool)> {
    match locator {
        Locator::Memory => vec![(Locator::Memory, true)],
        Locator::Postgres(_) => vec![(locator.clone(), true)],
        Locator::Sqlite(path) if path.as_os_str() == OsStr::new(":memory:") => {
            vec![(locator.clone(), true)]
        }
        Locator::Sqlite(_) | Locator::FlatFile(_) => {
            let mut chain = vec![(locator.clone(), false)];
            if let Some(sibling) = locator.default_sibling_flat_file() {
                chain.push((sibling, false));
            }
            if create {
                chain.push((locator.clone(), true));
                let in_memory = match locator {
                    Locator::Sqlite(_) => Locator::Sqlite(PathBuf::from(":memory:")),
                    _ => Locator::Memory,
                };
                chain.push((in_memory, true));
            }
            chain
        }
    }
}
