//! Search query representation.

use serde::{Deserialize, Serialize};

use crate::{Result, SearchError};

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search terms.
    pub text: String,
    /// Provider to start with. `None` uses the registry default.
    pub provider: Option<String>,
    /// Route providers that require it through the anonymizing transport.
    pub anonymize: bool,
}

impl SearchQuery {
    /// Creates a query for the default provider over the direct transport.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provider: None,
            anonymize: false,
        }
    }

    /// Starts the search at a specific provider.
    pub fn with_provider(mut self, id: impl Into<String>) -> Self {
        self.provider = Some(id.into());
        self
    }

    /// Sets whether the anonymizing transport may be used.
    pub fn with_anonymizing(mut self, anonymize: bool) -> Self {
        self.anonymize = anonymize;
        self
    }

    /// Returns the trimmed search terms, or `InvalidQuery` when there are none.
    pub fn terms(&self) -> Result<&str> {
        let terms = self.text.trim();
        if terms.is_empty() {
            return Err(SearchError::InvalidQuery("query is empty".to_string()));
        }
        Ok(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_new() {
        let query = SearchQuery::new("test query");
        assert_eq!(query.text, "test query");
        assert!(query.provider.is_none());
        assert!(!query.anonymize);
    }

    #[test]
    fn test_search_query_builder_chain() {
        let query = SearchQuery::new("rust programming")
            .with_provider("wikipedia")
            .with_anonymizing(true);
        assert_eq!(query.provider.as_deref(), Some("wikipedia"));
        assert!(query.anonymize);
    }

    #[test]
    fn test_terms_trimmed() {
        let query = SearchQuery::new("  cats \n");
        assert_eq!(query.terms().unwrap(), "cats");
    }

    #[test]
    fn test_terms_rejects_blank() {
        assert!(matches!(
            SearchQuery::new("   ").terms(),
            Err(SearchError::InvalidQuery(_))
        ));
        assert!(SearchQuery::new("").terms().is_err());
    }

    #[test]
    fn test_search_query_serialization() {
        let query = SearchQuery::new("test").with_provider("ddg");
        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains("\"text\":\"test\""));
        assert!(json.contains("\"provider\":\"ddg\""));
    }
}
