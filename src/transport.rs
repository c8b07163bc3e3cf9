//! Outbound HTTP transport.
//!
//! Every request waits a random courtesy delay before it is sent, and every
//! stage of the call is bounded by the caller's timeout and abortable through
//! the [`CancellationToken`]. Errors never escape as `Err`: callers receive a
//! [`FetchOutcome`] and decide what a failure means for them.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::Client;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::proxy::ProxyConfig;
use crate::{Result, SearchError};

/// Browser User-Agent strings, one picked per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Why a fetch did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The cancellation token fired.
    Cancelled,
    /// The call exceeded its time budget.
    Timeout,
    /// Server answered outside the 2xx range.
    Status(u16),
    /// DNS, connection or body read failure.
    Network(String),
    /// The URL is not absolute or cannot be parsed.
    InvalidUrl(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Cancelled => write!(f, "cancelled"),
            FetchFailure::Timeout => write!(f, "timed out"),
            FetchFailure::Status(code) => write!(f, "HTTP status {}", code),
            FetchFailure::Network(msg) => write!(f, "network error: {}", msg),
            FetchFailure::InvalidUrl(url) => write!(f, "invalid URL: {}", url),
        }
    }
}

/// Result of a single outbound request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A 2xx response with its body decoded as text.
    Success {
        status: u16,
        headers: HeaderMap,
        body: String,
        /// Final URL after redirects.
        url: String,
    },
    /// The request did not produce a usable response.
    Failure { cause: FetchFailure },
}

impl FetchOutcome {
    /// Shorthand for a failure outcome.
    pub fn failure(cause: FetchFailure) -> Self {
        FetchOutcome::Failure { cause }
    }

    /// Returns whether this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// Returns the `content-type` header of a success, lowercased.
    pub fn content_type(&self) -> Option<String> {
        match self {
            FetchOutcome::Success { headers, .. } => headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_ascii_lowercase()),
            FetchOutcome::Failure { .. } => None,
        }
    }
}

/// Random courtesy delay applied before every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    /// Lower bound in milliseconds.
    pub min_ms: u64,
    /// Upper bound in milliseconds (inclusive).
    pub max_ms: u64,
}

impl Jitter {
    /// Creates a jitter range; bounds are swapped if given in reverse.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Draws one delay uniformly from the range.
    pub fn sample(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new(500, 2000)
    }
}

/// Issues single HTTP GET requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url`, optionally through the anonymizing proxy.
    ///
    /// `timeout` bounds the whole call including the courtesy delay.
    async fn fetch(
        &self,
        url: &str,
        use_proxy: bool,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> FetchOutcome;
}

/// reqwest-backed transport with a direct and a proxied client.
pub struct HttpTransport {
    direct: Client,
    proxied: Client,
    jitter: Jitter,
}

impl HttpTransport {
    /// Creates a transport routing proxied requests through `proxy`.
    pub fn new(proxy: &ProxyConfig, jitter: Jitter) -> Result<Self> {
        let user_agent = random_user_agent();
        let direct = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| SearchError::Other(format!("Failed to create HTTP client: {}", e)))?;
        let proxied = Client::builder()
            .user_agent(user_agent)
            .proxy(proxy.to_reqwest()?)
            .build()
            .map_err(|e| SearchError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            direct,
            proxied,
            jitter,
        })
    }

    /// Returns the configured jitter range.
    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    async fn send(&self, url: &str, use_proxy: bool, cancel: &CancellationToken) -> FetchOutcome {
        let delay = self.jitter.sample();
        if cancel.sleep(delay).await.is_err() {
            return FetchOutcome::failure(FetchFailure::Cancelled);
        }

        if cancel.is_cancelled() {
            return FetchOutcome::failure(FetchFailure::Cancelled);
        }

        let client = if use_proxy { &self.proxied } else { &self.direct };
        debug!(url, use_proxy, delay_ms = delay.as_millis() as u64, "Dispatching request");

        let request = async {
            let response = client.get(url).send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let final_url = response.url().to_string();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, headers, final_url, body))
        };

        let outcome = match cancel.run(request).await {
            Err(_) => return FetchOutcome::failure(FetchFailure::Cancelled),
            Ok(Err(e)) if e.is_timeout() => FetchOutcome::failure(FetchFailure::Timeout),
            Ok(Err(e)) => FetchOutcome::failure(FetchFailure::Network(e.to_string())),
            Ok(Ok((status, _, _, _))) if !status.is_success() => {
                FetchOutcome::failure(FetchFailure::Status(status.as_u16()))
            }
            Ok(Ok((status, headers, url, body))) => FetchOutcome::Success {
                status: status.as_u16(),
                headers,
                body,
                url,
            },
        };

        if cancel.is_cancelled() {
            return FetchOutcome::failure(FetchFailure::Cancelled);
        }
        outcome
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        use_proxy: bool,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        if let Err(cause) = validate_url(url) {
            return FetchOutcome::failure(cause);
        }

        match tokio::time::timeout(timeout, self.send(url, use_proxy, cancel)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::failure(FetchFailure::Timeout),
        }
    }
}

/// Rejects relative or non-HTTP URLs.
pub fn validate_url(url: &str) -> std::result::Result<(), FetchFailure> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(FetchFailure::InvalidUrl(url.to_string())),
    }
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}
