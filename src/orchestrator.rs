//! Search orchestration with cross-provider fallback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::challenge::ChallengeDetector;
use crate::extract::{direct_answer, DirectAnswer, ExtractContext, Extraction, ResultExtractor};
use crate::history::{HistoryEntry, HistorySink, NoHistory};
use crate::provider::{ResponseKind, StructuredFormat};
use crate::registry::ProviderRegistry;
use crate::transport::{FetchOutcome, Transport};
use crate::{Result, SearchError, SearchQuery, SearchResults};

/// Default per-request time budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider asked by [`SearchOrchestrator::answer`] when the query names none.
pub const ANSWER_PROVIDER: &str = "ddg_api";

/// Runs one search through a provider and, when it fails, through its
/// fallback alternates.
///
/// A provider fails when the request fails or the response is a challenge
/// page. No provider is tried twice in one call. When every candidate has
/// failed the call still succeeds, with an empty [`SearchResults`] whose
/// [`hint`](SearchResults::hint) explains what to try next.
pub struct SearchOrchestrator {
    transport: Arc<dyn Transport>,
    detector: ChallengeDetector,
    extractor: ResultExtractor,
    history: Arc<dyn HistorySink>,
    timeout: Duration,
}

impl SearchOrchestrator {
    /// Creates an orchestrator that records no history.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            detector: ChallengeDetector::default(),
            extractor: ResultExtractor::new(),
            history: Arc::new(NoHistory),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the sink that receives a record for every served search.
    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = history;
        self
    }

    /// Replaces the challenge detector.
    pub fn with_detector(mut self, detector: ChallengeDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Sets the per-request time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Searches starting at `query.provider` or the registry default.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` for blank terms
    /// - `UnknownProvider` / `ProviderDisabled` for a bad explicit provider
    /// - `Cancelled` once the token fires, never with partial results
    pub async fn search(
        &self,
        registry: &ProviderRegistry,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchResults> {
        let terms = query.terms()?;
        cancel.check()?;

        let first = match query.provider.as_deref() {
            Some(id) => {
                if !registry.get(id)?.is_enabled() {
                    return Err(SearchError::ProviderDisabled(id.to_string()));
                }
                id.to_string()
            }
            None => registry.default_provider()?.id().to_string(),
        };

        let start = Instant::now();
        let mut results = SearchResults::new();
        let mut current = Some(first);
        debug!(query = terms, anonymize = query.anonymize, "Starting search");

        while let Some(id) = current.take() {
            results.attempted.push(id.clone());

            match self.attempt(registry, &id, terms, query.anonymize, cancel).await {
                Ok(extraction) => {
                    results.provider = Some(id.clone());
                    results.degraded = extraction.degraded;
                    for result in extraction.results {
                        results.add_result(result);
                    }
                    results.set_duration(start.elapsed().as_millis() as u64);

                    info!(
                        provider = %id,
                        count = results.count,
                        degraded = results.degraded,
                        attempts = results.attempted.len(),
                        "Search served"
                    );
                    self.history
                        .record(HistoryEntry::search(terms, id, results.count));
                    return Ok(results);
                }
                Err(e) if e.is_cancelled() => return Err(SearchError::Cancelled),
                Err(
                    e @ (SearchError::Fetch(_)
                    | SearchError::Challenge(_)
                    | SearchError::ProviderDisabled(_)),
                ) => {
                    warn!(provider = %id, error = %e, "Provider failed, falling back");
                }
                Err(e) => return Err(e),
            }

            current = registry
                .fallback_order(&id)
                .into_iter()
                .find(|next| !results.attempted.contains(next));
        }

        results.set_duration(start.elapsed().as_millis() as u64);
        warn!(attempted = ?results.attempted, "All providers failed");
        Ok(results)
    }

    /// Asks the instant-answer provider a question and returns its direct
    /// answer, if it has one.
    ///
    /// Only `query.provider` (or [`ANSWER_PROVIDER`]) is asked; there is no
    /// fallback chain and no history record. A failed request or challenge
    /// page gives `Ok(None)`, same as a response without an answer.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` for a blank question
    /// - `Config` when the provider does not return instant answers
    /// - `UnknownProvider` / `ProviderDisabled` for a bad provider
    /// - `Cancelled` once the token fires
    pub async fn answer(
        &self,
        registry: &ProviderRegistry,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<DirectAnswer>> {
        let terms = query.terms()?;
        cancel.check()?;

        let id = query.provider.as_deref().unwrap_or(ANSWER_PROVIDER);
        let provider = registry.get(id)?;
        if !matches!(
            provider.response(),
            ResponseKind::Structured(StructuredFormat::InstantAnswer)
        ) {
            return Err(SearchError::Config(format!(
                "provider '{}' does not give instant answers",
                id
            )));
        }

        match self.fetch(registry, id, terms, query.anonymize, cancel).await {
            Ok((_, body)) => {
                let answer = direct_answer(&body);
                debug!(provider = id, found = answer.is_some(), "Instant answer lookup");
                Ok(answer)
            }
            Err(e) if e.is_cancelled() => Err(SearchError::Cancelled),
            Err(e @ (SearchError::Fetch(_) | SearchError::Challenge(_))) => {
                warn!(provider = id, error = %e, "Instant answer lookup failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// One request to one provider. Failures that the fallback chain
    /// recovers from come back as `Fetch`, `Challenge` or `ProviderDisabled`.
    async fn attempt(
        &self,
        registry: &ProviderRegistry,
        id: &str,
        terms: &str,
        anonymize: bool,
        cancel: &CancellationToken,
    ) -> Result<Extraction> {
        let (url, body) = self.fetch(registry, id, terms, anonymize, cancel).await?;
        let extraction = self.extractor.extract(&ExtractContext {
            provider: registry.get(id)?,
            body: &body,
            query: terms,
            request_url: &url,
        });
        cancel.check()?;
        Ok(extraction)
    }

    /// Requests the provider's result page and screens it for challenges.
    /// Returns the request URL and the response body.
    async fn fetch(
        &self,
        registry: &ProviderRegistry,
        id: &str,
        terms: &str,
        anonymize: bool,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        let provider = registry.get(id)?;
        if !provider.is_enabled() {
            return Err(SearchError::ProviderDisabled(id.to_string()));
        }

        cancel.check()?;
        let url = provider.build_url(terms);
        let use_proxy = provider.requires_proxy() && anonymize;

        cancel.check()?;
        debug!(provider = id, use_proxy, "Querying provider");
        let body = match self.transport.fetch(&url, use_proxy, self.timeout, cancel).await {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::Failure { cause } => return Err(cause.into()),
        };

        let challenge = self.detector.matched_phrase(&body).map(str::to_string);
        cancel.check()?;
        if let Some(phrase) = challenge {
            debug!(provider = id, phrase = %phrase, "Challenge page detected");
            return Err(SearchError::Challenge(id.to_string()));
        }
        Ok((url, body))
    }
}
