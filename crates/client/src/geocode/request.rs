//! Geocode request arguments and validation.

use std::collections::BTreeMap;

use gazetteer_core::Error;

/// Arguments of one geocode call.
///
/// Exactly one of `query` (free text) or `structured` (per-field) must be
/// set. Structured queries are recognized but unimplemented; they are
/// rejected outright rather than silently ignored.
#[derive(Debug, Clone, Default)]
pub struct GeocodeRequest {
    /// Free-text place query, e.g. "Paris, France".
    pub query: Option<String>,

    /// Structured query fields (street, city, ...). Not supported.
    pub structured: Option<BTreeMap<String, String>>,
}

impl GeocodeRequest {
    /// A free-text request.
    pub fn text(query: impl Into<String>) -> Self {
        Self { query: Some(query.into()), structured: None }
    }

    /// Validate the argument combination and return the query text.
    ///
    /// Runs before any cache or network access.
    pub fn validate(&self) -> Result<&str, Error> {
        match (&self.query, &self.structured) {
            (Some(_), Some(_)) => {
                Err(Error::InvalidQuery("only one of query or structured may be set".into()))
            }
            (None, None) => Err(Error::InvalidQuery("one of query or structured must be set".into())),
            (None, Some(_)) => Err(Error::StructuredQueryUnsupported),
            (Some(query), None) => Ok(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_text_accepted() {
        let request = GeocodeRequest::text("Paris, France");
        assert_eq!(request.validate().unwrap(), "Paris, France");
    }

    #[test]
    fn test_neither_form_rejected() {
        let request = GeocodeRequest::default();
        assert!(matches!(request.validate(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_both_forms_rejected() {
        let request = GeocodeRequest {
            query: Some("Paris".into()),
            structured: Some(BTreeMap::from([("city".to_string(), "Paris".to_string())])),
        };
        assert!(matches!(request.validate(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_structured_rejected_loudly() {
        let request = GeocodeRequest {
            query: None,
            structured: Some(BTreeMap::from([("city".to_string(), "Paris".to_string())])),
        };
        assert!(matches!(request.validate(), Err(Error::StructuredQueryUnsupported)));
    }
}
