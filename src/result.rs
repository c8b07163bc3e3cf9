//! Search result types.

use serde::{Deserialize, Serialize};

use crate::text::truncate_chars;

/// Maximum number of results in one list.
pub const MAX_RESULTS: usize = 10;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 80;

/// Maximum snippet length in characters.
pub const MAX_SNIPPET_CHARS: usize = 150;

/// Shown when every provider in the fallback chain failed.
pub const EXHAUSTED_HINT: &str =
    "All search providers failed. Try enabling the anonymizing transport or use a different network.";

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title, at most [`MAX_TITLE_CHARS`] characters.
    pub title: String,
    /// Absolute target URL.
    pub url: String,
    /// Result description, at most [`MAX_SNIPPET_CHARS`] characters.
    pub snippet: String,
    /// Display name of the provider that produced it.
    pub provider: String,
}

impl SearchResult {
    /// Creates a result, truncating title and snippet to their bounds.
    pub fn new(
        url: impl Into<String>,
        title: impl AsRef<str>,
        snippet: impl AsRef<str>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            title: truncate_chars(title.as_ref().trim(), MAX_TITLE_CHARS),
            url: url.into(),
            snippet: truncate_chars(snippet.as_ref().trim(), MAX_SNIPPET_CHARS),
            provider: provider.into(),
        }
    }

    /// Returns a normalized URL for deduplication (without scheme and trailing slash).
    pub fn normalized_url(&self) -> String {
        let url = self
            .url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        url.to_lowercase()
    }
}

/// Outcome of one search call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    /// Results in extraction order.
    results: Vec<SearchResult>,
    /// Id of the provider that served the results.
    pub provider: Option<String>,
    /// Provider ids attempted, in order.
    pub attempted: Vec<String>,
    /// Extraction found nothing and a placeholder result was used.
    pub degraded: bool,
    /// Number of results.
    pub count: usize,
    /// Search duration in milliseconds.
    pub duration_ms: u64,
}

impl SearchResults {
    /// Creates a new empty result container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a result unless the list is already full.
    pub fn add_result(&mut self, result: SearchResult) -> bool {
        if self.results.len() >= MAX_RESULTS {
            return false;
        }
        self.results.push(result);
        self.count = self.results.len();
        true
    }

    /// Returns the results.
    pub fn items(&self) -> &[SearchResult] {
        &self.results
    }

    /// Consumes the container, returning the results.
    pub fn into_items(self) -> Vec<SearchResult> {
        self.results
    }

    /// True when no provider in the chain produced a response.
    pub fn is_exhausted(&self) -> bool {
        self.provider.is_none()
    }

    /// Actionable advice for an exhausted chain.
    pub fn hint(&self) -> Option<&'static str> {
        self.is_exhausted().then_some(EXHAUSTED_HINT)
    }

    /// Sets the search duration.
    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }
}
