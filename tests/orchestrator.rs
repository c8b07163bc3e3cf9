//! End-to-end searches against a scripted transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use veil_search::{
    AnswerKind, CancellationToken, FetchFailure, FetchOutcome, HistoryEntry, MarkupRules,
    MemoryHistory, ProviderDescriptor, ProviderRegistry, ResponseKind, SearchError,
    SearchOrchestrator, SearchQuery, Transport, EXHAUSTED_HINT, MAX_RESULTS,
};

/// Answers requests by matching the URL against a host fragment.
#[derive(Default)]
struct ScriptedTransport {
    routes: Vec<(String, FetchOutcome)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn route(mut self, host: &str, outcome: FetchOutcome) -> Self {
        self.routes.push((host.to_string(), outcome));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(
        &self,
        url: &str,
        _use_proxy: bool,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> FetchOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .iter()
            .find(|(host, _)| url.contains(host.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| {
                FetchOutcome::failure(FetchFailure::Network("connection refused".into()))
            })
    }
}

fn ok(body: impl Into<String>) -> FetchOutcome {
    FetchOutcome::Success {
        status: 200,
        headers: HeaderMap::new(),
        body: body.into(),
        url: String::new(),
    }
}

fn google_page(hits: &[(&str, &str)]) -> String {
    hits.iter()
        .map(|(url, title)| {
            format!(
                r#"<div class="g"><a href="{url}"><h3 class="LC20lb">{title}</h3></a><div class="VwiC3b">About {title}</div></div>"#
            )
        })
        .collect()
}

#[tokio::test]
async fn test_structured_abstract_and_related_topics() {
    let body = r#"{
        "Heading": "Rust",
        "AbstractText": "Rust is a general-purpose programming language.",
        "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
        "RelatedTopics": [
            {"Text": "Cargo - Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
            {"Text": "Ferris - Rust mascot", "FirstURL": "https://duckduckgo.com/Ferris"}
        ]
    }"#;
    let transport = Arc::new(ScriptedTransport::default().route("api.duckduckgo.com", ok(body)));
    let orchestrator = SearchOrchestrator::new(transport);
    let mut registry = ProviderRegistry::builtin();
    registry.set_default("ddg_api").unwrap();

    let results = orchestrator
        .search(&registry, &SearchQuery::new("cats"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(results.count, 3);
    assert!(!results.degraded);
    assert_eq!(
        results.items()[0].url,
        "https://en.wikipedia.org/wiki/Rust_(programming_language)"
    );
    assert_eq!(results.items()[1].title, "Cargo");
    assert_eq!(results.items()[2].title, "Ferris");
}

#[tokio::test]
async fn test_challenge_page_falls_back_to_first_alternate() {
    let challenge = r#"<html><body><h1>Confirm you are human</h1>
        <a href="https://leak.example/">This link must never be returned</a></body></html>"#;
    let transport = Arc::new(
        ScriptedTransport::default()
            .route("search.brave.com", ok(challenge))
            .route(
                "www.google.com",
                ok(google_page(&[("https://www.rust-lang.org/", "Rust Programming Language")])),
            ),
    );
    let history = Arc::new(MemoryHistory::new());
    let orchestrator = SearchOrchestrator::new(transport.clone()).with_history(history.clone());

    let results = orchestrator
        .search(&ProviderRegistry::builtin(), &SearchQuery::new("rust"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(results.attempted, vec!["brave", "google"]);
    assert_eq!(results.provider.as_deref(), Some("google"));
    assert!(results.items().iter().all(|r| !r.url.contains("leak.example")));
    assert_eq!(results.items()[0].url, "https://www.rust-lang.org/");
    assert_eq!(results.items()[0].snippet, "About Rust Programming Language");
    assert_eq!(transport.calls().len(), 2);

    let entries = history.entries();
    assert_eq!(entries.len(), 1);
    assert!(matches!(&entries[0], HistoryEntry::Search { provider, .. } if provider == "google"));
}

#[tokio::test]
async fn test_every_provider_failing_is_not_an_error() {
    let transport = Arc::new(ScriptedTransport::default());
    let history = Arc::new(MemoryHistory::new());
    let orchestrator = SearchOrchestrator::new(transport.clone()).with_history(history.clone());

    let results = orchestrator
        .search(&ProviderRegistry::builtin(), &SearchQuery::new("rust"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(results.items().is_empty());
    assert!(results.is_exhausted());
    assert_eq!(results.hint(), Some(EXHAUSTED_HINT));
    assert!(history.is_empty());

    // brave -> google -> ddg_api -> wikipedia, each at most once.
    assert_eq!(results.attempted, vec!["brave", "google", "ddg_api", "wikipedia"]);
    assert_eq!(transport.calls().len(), 4);
}

#[tokio::test]
async fn test_relaxed_rule_is_capped() {
    let body: String = (0..12)
        .map(|i| {
            format!(r#"<p><a href="https://site{i}.example/page">Plain result {i}</a></p>"#)
        })
        .collect();
    let transport = Arc::new(ScriptedTransport::default().route("www.google.com", ok(body)));
    let orchestrator = SearchOrchestrator::new(transport);
    let query = SearchQuery::new("rust").with_provider("google");

    let results = orchestrator
        .search(&ProviderRegistry::builtin(), &query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(results.count, MAX_RESULTS);
    assert_eq!(results.items().len(), MAX_RESULTS);
    assert_eq!(results.items()[0].snippet, "Search result for: rust");
}

#[tokio::test]
async fn test_unparseable_response_gives_placeholder() {
    let transport = Arc::new(
        ScriptedTransport::default().route("en.wikipedia.org", ok("<html>maintenance</html>")),
    );
    let orchestrator = SearchOrchestrator::new(transport);
    let query = SearchQuery::new("rust").with_provider("wikipedia");

    let results = orchestrator
        .search(&ProviderRegistry::builtin(), &query, &CancellationToken::new())
        .await
        .unwrap();

    assert!(results.degraded);
    assert_eq!(results.count, 1);
    assert_eq!(results.items()[0].title, "View Wikipedia Search Results");
    assert!(results.items()[0].url.starts_with("https://en.wikipedia.org/w/api.php?"));
}

#[tokio::test]
async fn test_results_respect_bounds() {
    let long_title = "t".repeat(300);
    let long_text = "s".repeat(600);
    let hits: Vec<(String, String)> = (0..20)
        .map(|i| (format!("https://site{i}.example/"), format!("{long_title}{i}")))
        .collect();
    let body: String = hits
        .iter()
        .map(|(url, title)| {
            format!(
                r#"<a href="{url}"><h3>{title}</h3></a><div class="VwiC3b">{long_text}</div>"#
            )
        })
        .collect();
    let transport = Arc::new(ScriptedTransport::default().route("www.google.com", ok(body)));
    let orchestrator = SearchOrchestrator::new(transport);
    let query = SearchQuery::new("bounds").with_provider("google");

    let results = orchestrator
        .search(&ProviderRegistry::builtin(), &query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(results.count, MAX_RESULTS);
    for result in results.items() {
        assert!(result.title.chars().count() <= 80);
        assert!(result.snippet.chars().count() <= 150);
    }
}

#[tokio::test]
async fn test_disabled_alternates_are_skipped() {
    let mut registry = ProviderRegistry::builtin();
    registry.set_enabled("google", false).unwrap();
    let transport = Arc::new(ScriptedTransport::default());
    let orchestrator = SearchOrchestrator::new(transport.clone());

    let results = orchestrator
        .search(&registry, &SearchQuery::new("rust"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!results.attempted.iter().any(|id| id == "google"));
    assert!(transport.calls().iter().all(|url| !url.contains("google.com")));
}

#[tokio::test]
async fn test_custom_fallback_table() {
    let provider = |id: &str| {
        ProviderDescriptor::new(
            id,
            id,
            format!("https://{id}.test/search"),
            ResponseKind::Markup(MarkupRules::new(format!("{id}.test"))),
        )
        .with_param("q", "{query}")
    };
    let mut registry = ProviderRegistry::new(vec![
        provider("a"),
        provider("b"),
        provider("c"),
        provider("d").disabled(),
    ])
    .unwrap();
    registry.set_fallbacks("a", ["c"]).unwrap();
    registry.set_fallbacks("c", ["a"]).unwrap();

    let orchestrator = SearchOrchestrator::new(Arc::new(ScriptedTransport::default()));
    let results = orchestrator
        .search(&registry, &SearchQuery::new("x"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(results.attempted, vec!["a", "c"]);
}

const COMPUTED_ANSWER: &str = r#"{
    "AbstractText": "",
    "Answer": "2 + 2 = 4",
    "Definition": "four: the cardinal number that is the sum of three and one"
}"#;

#[tokio::test]
async fn test_instant_answer_without_abstract_is_not_degraded() {
    let transport = Arc::new(
        ScriptedTransport::default().route("api.duckduckgo.com", ok(COMPUTED_ANSWER)),
    );
    let orchestrator = SearchOrchestrator::new(transport);
    let query = SearchQuery::new("2+2").with_provider("ddg_api");

    let results = orchestrator
        .search(&ProviderRegistry::builtin(), &query, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!results.degraded);
    let snippets: Vec<&str> = results.items().iter().map(|r| r.snippet.as_str()).collect();
    assert_eq!(
        snippets,
        vec![
            "four: the cardinal number that is the sum of three and one",
            "2 + 2 = 4"
        ]
    );
}

#[tokio::test]
async fn test_answer_prefers_definition_over_computed_answer() {
    let transport = Arc::new(
        ScriptedTransport::default().route("api.duckduckgo.com", ok(COMPUTED_ANSWER)),
    );
    let orchestrator = SearchOrchestrator::new(transport.clone());

    let answer = orchestrator
        .answer(
            &ProviderRegistry::builtin(),
            &SearchQuery::new("four"),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.kind, AnswerKind::Definition);
    assert!(answer.text.starts_with("four: "));
    assert!(transport.calls()[0].contains("api.duckduckgo.com"));
}

#[tokio::test]
async fn test_answer_missing_when_api_has_nothing() {
    let transport =
        Arc::new(ScriptedTransport::default().route("api.duckduckgo.com", ok(r#"{}"#)));
    let orchestrator = SearchOrchestrator::new(transport.clone());

    let answer = orchestrator
        .answer(
            &ProviderRegistry::builtin(),
            &SearchQuery::new("obscure question"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(answer.is_none());
    assert_eq!(transport.calls().len(), 1);
}

/// Fires the token while "in flight", then reports success anyway.
struct CancellingTransport {
    body: String,
}

#[async_trait]
impl Transport for CancellingTransport {
    async fn fetch(
        &self,
        _url: &str,
        _use_proxy: bool,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        cancel.cancel();
        ok(self.body.clone())
    }
}

#[tokio::test]
async fn test_cancel_during_fetch_returns_no_results() {
    let transport = Arc::new(CancellingTransport {
        body: google_page(&[("https://a.example/", "A result")]),
    });
    let history = Arc::new(MemoryHistory::new());
    let orchestrator = SearchOrchestrator::new(transport).with_history(history.clone());
    let query = SearchQuery::new("rust").with_provider("google");

    let result = orchestrator
        .search(&ProviderRegistry::builtin(), &query, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SearchError::Cancelled)));
    assert!(history.is_empty());
}

/// Waits until cancelled, like a request to a server that never answers.
struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn fetch(
        &self,
        _url: &str,
        _use_proxy: bool,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        cancel.cancelled().await;
        FetchOutcome::failure(FetchFailure::Cancelled)
    }
}

#[tokio::test]
async fn test_cancel_from_another_task() {
    let orchestrator = SearchOrchestrator::new(Arc::new(HangingTransport));
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        interrupt.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.search(&ProviderRegistry::builtin(), &SearchQuery::new("rust"), &cancel),
    )
    .await
    .expect("search should stop promptly after cancellation");

    assert!(matches!(result, Err(SearchError::Cancelled)));
}
