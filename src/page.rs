//! Page retrieval for in-terminal display.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::cancel::CancellationToken;
use crate::history::{HistoryEntry, HistorySink, NoHistory};
use crate::orchestrator::DEFAULT_TIMEOUT;
use crate::result::MAX_TITLE_CHARS;
use crate::text::{collapse_whitespace, truncate_chars};
use crate::transport::{FetchOutcome, Transport};
use crate::{Result, SearchError};

/// Maximum characters of page text kept for display.
pub const PAGE_TEXT_LIMIT: usize = 2000;

/// Removes script and style blocks together with their content.
const NON_CONTENT_PATTERN: &str =
    r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>";

/// A page reduced to plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub url: String,
    pub title: String,
    /// Plain text, at most [`PAGE_TEXT_LIMIT`] characters.
    pub content: String,
    /// Loaded through the anonymizing transport.
    pub anonymized: bool,
}

/// Loads pages and reduces them to text.
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    history: Arc<dyn HistorySink>,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            history: Arc::new(NoHistory),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = history;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Loads `url`. Onion addresses always go through the anonymizing
    /// transport; other URLs only when `anonymize` is set.
    pub async fn load(
        &self,
        url: &str,
        anonymize: bool,
        cancel: &CancellationToken,
    ) -> Result<PageView> {
        cancel.check()?;
        let use_proxy = anonymize || is_onion(url);
        debug!(use_proxy, "Loading page");

        let outcome = self.transport.fetch(url, use_proxy, self.timeout, cancel).await;
        let content_type = outcome.content_type().unwrap_or_default();
        let body = match outcome {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::Failure { cause } => return Err(cause.into()),
        };
        cancel.check()?;

        let view = if content_type.contains("text/html") {
            render_html(url, &body, use_proxy)?
        } else {
            PageView {
                url: url.to_string(),
                title: url.to_string(),
                content: truncate_chars(&body, PAGE_TEXT_LIMIT),
                anonymized: use_proxy,
            }
        };

        self.history.record(HistoryEntry::visit(
            url,
            truncate_chars(&view.title, MAX_TITLE_CHARS),
            view.anonymized,
        ));
        Ok(view)
    }
}

/// Turns a typed address into a URL: input without an `http://` or
/// `https://` scheme gets `https://` in front.
pub fn normalize_address(input: &str) -> String {
    let input = input.trim();
    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    }
}

/// Returns whether the URL's host is a Tor onion service.
pub fn is_onion(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase().ends_with(".onion")))
        .unwrap_or(false)
}

/// Reduces an HTML document to its title and visible text.
pub fn render_html(url: &str, html: &str, anonymized: bool) -> Result<PageView> {
    let non_content = Regex::new(NON_CONTENT_PATTERN)
        .map_err(|e| SearchError::Parse(format!("invalid pattern: {}", e)))?;
    let cleaned = non_content.replace_all(html, " ");
    let document = Html::parse_document(&cleaned);

    let title_selector =
        Selector::parse("title").map_err(|e| SearchError::Parse(format!("{:?}", e)))?;
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.to_string());

    let body_selector =
        Selector::parse("body").map_err(|e| SearchError::Parse(format!("{:?}", e)))?;
    let text = match document.select(&body_selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };

    Ok(PageView {
        url: url.to_string(),
        title,
        content: truncate_chars(&collapse_whitespace(&text), PAGE_TEXT_LIMIT),
        anonymized,
    })
}
