//! Provider descriptors and response kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the escaped query in parameter templates.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Layout of a structured (JSON) provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredFormat {
    /// Instant-answer document: abstract, related topics, external results.
    InstantAnswer,
    /// OpenSearch suggestion array: `[query, titles, descriptions, urls]`.
    OpenSearch,
}

/// Pattern rules for scraping a markup (HTML) results page.
///
/// Every primary pattern must define the named groups `url` and `title`.
/// The optional snippet pattern must define `snippet`; it is searched in the
/// markup between one result anchor and the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupRules {
    /// Result-anchor patterns, tried in order until one matches.
    pub primary: Vec<String>,
    /// Snippet pattern searched after each matched anchor.
    pub snippet: Option<String>,
    /// The provider's own domain; links to it are page chrome, not results.
    pub own_domain: String,
}

impl MarkupRules {
    /// Creates rules for a provider hosted on `own_domain`.
    pub fn new(own_domain: impl Into<String>) -> Self {
        Self {
            primary: Vec::new(),
            snippet: None,
            own_domain: own_domain.into(),
        }
    }

    /// Adds a result-anchor pattern.
    pub fn with_primary(mut self, pattern: impl Into<String>) -> Self {
        self.primary.push(pattern.into());
        self
    }

    /// Sets the snippet pattern.
    pub fn with_snippet(mut self, pattern: impl Into<String>) -> Self {
        self.snippet = Some(pattern.into());
        self
    }
}

/// How a provider's response body is shaped. Selects the extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// JSON document.
    Structured(StructuredFormat),
    /// HTML results page.
    Markup(MarkupRules),
}

impl ResponseKind {
    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ResponseKind::Structured(_) => "structured",
            ResponseKind::Markup(_) => "markup",
        }
    }
}

/// One external search backend.
///
/// Everything but the enabled flag is fixed at construction; the flag is
/// flipped through [`ProviderRegistry`](crate::ProviderRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    id: String,
    name: String,
    endpoint: String,
    params: Vec<(String, String)>,
    response: ResponseKind,
    requires_proxy: bool,
    pub(crate) enabled: bool,
}

impl ProviderDescriptor {
    /// Creates an enabled provider with no query parameters.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        response: ResponseKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            params: Vec::new(),
            response,
            requires_proxy: false,
            enabled: true,
        }
    }

    /// Appends a query parameter; `{query}` in the value is substituted.
    pub fn with_param(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.params.push((name.into(), template.into()));
        self
    }

    /// Marks the provider as reachable only through the anonymizing transport.
    pub fn requiring_proxy(mut self) -> Self {
        self.requires_proxy = true;
        self
    }

    /// Starts the provider disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn response(&self) -> &ResponseKind {
        &self.response
    }

    pub fn requires_proxy(&self) -> bool {
        self.requires_proxy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Builds the request URL for `query`.
    pub fn build_url(&self, query: &str) -> String {
        let escaped = urlencoding::encode(query);
        let mut url = self.endpoint.clone();
        if !self.params.is_empty() {
            let pairs: Vec<String> = self
                .params
                .iter()
                .map(|(name, template)| {
                    format!("{}={}", name, template.replace(QUERY_PLACEHOLDER, &escaped))
                })
                .collect();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&pairs.join("&"));
        }
        url
    }
}

impl fmt::Display for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wiki() -> ProviderDescriptor {
        ProviderDescriptor::new(
            "wikipedia",
            "Wikipedia",
            "https://en.wikipedia.org/w/api.php",
            ResponseKind::Structured(StructuredFormat::OpenSearch),
        )
        .with_param("action", "opensearch")
        .with_param("search", "{query}")
        .with_param("limit", "10")
    }

    #[test]
    fn test_descriptor_defaults() {
        let provider = wiki();
        assert_eq!(provider.id(), "wikipedia");
        assert_eq!(provider.name(), "Wikipedia");
        assert!(provider.is_enabled());
        assert!(!provider.requires_proxy());
        assert_eq!(provider.params().len(), 3);
        assert_eq!(provider.response().label(), "structured");
    }

    #[test]
    fn test_build_url_escapes_query() {
        let url = wiki().build_url("rust & cats");
        assert_eq!(
            url,
            "https://en.wikipedia.org/w/api.php?action=opensearch&search=rust%20%26%20cats&limit=10"
        );
    }

    #[test]
    fn test_build_url_without_params() {
        let provider = ProviderDescriptor::new(
            "plain",
            "Plain",
            "https://example.com/search",
            ResponseKind::Markup(MarkupRules::new("example.com")),
        );
        assert_eq!(provider.build_url("x"), "https://example.com/search");
    }

    #[test]
    fn test_build_url_appends_to_existing_query() {
        let provider = ProviderDescriptor::new(
            "p",
            "P",
            "https://example.com/s?src=cli",
            ResponseKind::Markup(MarkupRules::new("example.com")),
        )
        .with_param("q", "{query}");
        assert_eq!(provider.build_url("a b"), "https://example.com/s?src=cli&q=a%20b");
    }

    #[test]
    fn test_requiring_proxy_and_disabled() {
        let provider = wiki().requiring_proxy().disabled();
        assert!(provider.requires_proxy());
        assert!(!provider.is_enabled());
    }

    #[test]
    fn test_markup_rules_builder() {
        let rules = MarkupRules::new("example.com")
            .with_primary("a")
            .with_primary("b")
            .with_snippet("s");
        assert_eq!(rules.primary, vec!["a", "b"]);
        assert_eq!(rules.snippet.as_deref(), Some("s"));
        assert_eq!(ResponseKind::Markup(rules).label(), "markup");
    }

    #[test]
    fn test_structured_format_serialization() {
        let json = serde_json::to_string(&StructuredFormat::InstantAnswer).unwrap();
        assert_eq!(json, "\"instant_answer\"");
    }

    #[test]
    fn test_display() {
        assert_eq!(wiki().to_string(), "Wikipedia (wikipedia)");
    }
}
