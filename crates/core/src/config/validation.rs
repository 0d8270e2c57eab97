//! Configuration validation rules.
//!
//! This module provides validation logic for [`SessionConfig`] values
//! after they have been loaded from options, environment, files, or
//! defaults. Configuration errors fail session creation outright with no
//! partial effect.

use crate::cache::locator::Locator;
use crate::config::SessionConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// Check that a template has one and only one `%s` placeholder.
///
/// `%%` escapes a literal percent; any other `%`-sequence (including a
/// trailing bare `%`) is rejected.
pub(crate) fn has_single_placeholder(template: &str) -> bool {
    let mut found = false;
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('%') => {}
                Some('s') => {
                    if found {
                        return false;
                    }
                    found = true;
                }
                _ => return false,
            }
        }
    }
    found
}

impl SessionConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the cache locator is not a recognized backend locator
    /// - the query template is missing, or does not contain exactly one
    ///   `%s` placeholder
    /// - `delay_secs` is not finite or outside 0..=3600
    /// - `application` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        Locator::parse(&self.cache_file)?;

        match &self.query_template {
            None => {
                return Err(ConfigError::Missing {
                    field: "query_template".into(),
                    hint: "set QUERY_TEMPLATE (or GEOCODE_QUERY_TEMPLATE) when the service has no built-in template"
                        .into(),
                });
            }
            Some(template) if !has_single_placeholder(template) => {
                return Err(ConfigError::Invalid {
                    field: "query_template".into(),
                    reason: "must contain exactly one %s placeholder".into(),
                });
            }
            Some(_) => {}
        }

        if !self.delay_secs.is_finite() || !(0.0..=3600.0).contains(&self.delay_secs) {
            return Err(ConfigError::Invalid {
                field: "delay_secs".into(),
                reason: "must be between 0 and 3600 seconds".into(),
            });
        }

        if self.application.is_empty() {
            return Err(ConfigError::Invalid { field: "application".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_template(template: &str) -> SessionConfig {
        SessionConfig { query_template: Some(template.to_string()), ..Default::default() }
    }

    #[test]
    fn test_validate_default_with_service_template() {
        let config = config_with_template("https://example.com/search?q=%s");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_placeholder_check() {
        assert!(has_single_placeholder("https://example.com/?q=%s"));
        assert!(has_single_placeholder("q=%s&pct=100%%"));
        assert!(!has_single_placeholder("no placeholder"));
        assert!(!has_single_placeholder("q=%s&r=%s"));
        assert!(!has_single_placeholder("q=%d"));
        assert!(!has_single_placeholder("trailing %"));
    }

    #[test]
    fn test_validate_missing_template() {
        let config = SessionConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing { field, .. }) if field == "query_template"));
    }

    #[test]
    fn test_validate_bad_template() {
        let config = config_with_template("two %s and %s");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "query_template"));
    }

    #[test]
    fn test_validate_bad_locator() {
        let config =
            SessionConfig { cache_file: "cache.parquet".into(), ..config_with_template("q=%s") };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "cache_file"));
    }

    #[test]
    fn test_validate_delay_range() {
        let config = SessionConfig { delay_secs: -1.0, ..config_with_template("q=%s") };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "delay_secs"));

        let config = SessionConfig { delay_secs: f64::NAN, ..config_with_template("q=%s") };
        assert!(config.validate().is_err());

        let config = SessionConfig { delay_secs: 0.0, ..config_with_template("q=%s") };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_application() {
        let config = SessionConfig { application: String::new(), ..config_with_template("q=%s") };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "application"));
    }
}
