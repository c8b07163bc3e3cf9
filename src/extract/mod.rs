//! Result extraction.
//!
//! A provider's [`ResponseKind`] selects the strategy: structured documents go
//! through [`StructuredStrategy`], HTML pages through [`MarkupStrategy`]. The
//! orchestrator only sees [`ResultExtractor`], so a different parsing backend
//! can replace either strategy without touching the fallback logic.

mod markup;
mod structured;

pub use markup::{MarkupStrategy, RELAXED_ANCHOR_PATTERN};
pub use structured::{direct_answer, AnswerKind, DirectAnswer, StructuredStrategy};

use tracing::{debug, warn};

use crate::provider::{ProviderDescriptor, ResponseKind};
use crate::result::{SearchResult, MAX_RESULTS};
use crate::Result;

/// Inputs of one extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub provider: &'a ProviderDescriptor,
    pub body: &'a str,
    pub query: &'a str,
    /// URL the body was fetched from.
    pub request_url: &'a str,
}

/// A way of turning a response body into results.
pub trait ExtractionStrategy {
    /// Extracts raw results. An empty list is a valid answer; `Err` means the
    /// body could not be read at all.
    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<Vec<SearchResult>>;
}

/// Results of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// At most [`MAX_RESULTS`] results, in extraction order.
    pub results: Vec<SearchResult>,
    /// Nothing usable was found and the list holds only the placeholder result.
    pub degraded: bool,
}

/// Dispatches to the strategy declared by the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultExtractor;

impl ResultExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts results from a successful fetch.
    ///
    /// Never returns an empty list: when nothing can be extracted the result is
    /// a single placeholder pointing at `request_url`.
    pub fn extract(&self, ctx: &ExtractContext<'_>) -> Extraction {
        let extracted = match ctx.provider.response() {
            ResponseKind::Structured(format) => StructuredStrategy::new(*format).extract(ctx),
            ResponseKind::Markup(rules) => MarkupStrategy::new(rules).extract(ctx),
        };

        let mut results = match extracted {
            Ok(results) => results,
            Err(e) => {
                warn!(provider = ctx.provider.id(), error = %e, "Extraction failed");
                Vec::new()
            }
        };

        if results.is_empty() {
            debug!(provider = ctx.provider.id(), "No results extracted, using placeholder");
            return Extraction {
                results: vec![synthetic_result(ctx)],
                degraded: true,
            };
        }

        results.truncate(MAX_RESULTS);
        Extraction {
            results,
            degraded: false,
        }
    }
}

/// Placeholder sending the user to the provider's own results page.
pub fn synthetic_result(ctx: &ExtractContext<'_>) -> SearchResult {
    SearchResult::new(
        ctx.request_url,
        format!("View {} Search Results", ctx.provider.name()),
        format!("Search results for '{}'", ctx.query),
        ctx.provider.name(),
    )
}
