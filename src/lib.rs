//! # veil-search
//!
//! A text-mode web search client library. Queries go to one of several
//! independent search providers; when a provider fails or answers with a
//! bot-challenge page the search falls back to the provider's alternates.
//!
//! - Structured (JSON) and markup (HTML) providers behind one extractor
//! - Courtesy delay and optional SOCKS routing on every request
//! - Cooperative cancellation of every network wait
//! - Page loading reduced to plain text
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use veil_search::{
//!     CancellationToken, HttpTransport, Jitter, ProviderRegistry, ProxyConfig,
//!     SearchOrchestrator, SearchQuery,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = HttpTransport::new(&ProxyConfig::default(), Jitter::default())?;
//!     let orchestrator = SearchOrchestrator::new(Arc::new(transport));
//!     let registry = ProviderRegistry::builtin();
//!
//!     let query = SearchQuery::new("rust programming");
//!     let results = orchestrator
//!         .search(&registry, &query, &CancellationToken::new())
//!         .await?;
//!
//!     for result in results.items() {
//!         println!("{}: {}", result.title, result.url);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod query;
mod result;
mod text;

pub mod cancel;
pub mod challenge;
pub mod config;
pub mod extract;
pub mod history;
pub mod orchestrator;
pub mod page;
pub mod provider;
pub mod proxy;
pub mod registry;
pub mod tor;
pub mod transport;

pub use cancel::CancellationToken;
pub use challenge::ChallengeDetector;
pub use config::Settings;
pub use error::{Result, SearchError};
pub use extract::{AnswerKind, DirectAnswer, Extraction, ResultExtractor};
pub use history::{HistoryEntry, HistorySink, MemoryHistory, NoHistory};
pub use orchestrator::SearchOrchestrator;
pub use page::{normalize_address, PageFetcher, PageView};
pub use provider::{MarkupRules, ProviderDescriptor, ResponseKind, StructuredFormat};
pub use proxy::{ProxyConfig, ProxyProtocol};
pub use query::SearchQuery;
pub use registry::ProviderRegistry;
pub use result::{SearchResult, SearchResults, EXHAUSTED_HINT, MAX_RESULTS};
pub use tor::{AnonymizerControl, TorProcess};
pub use transport::{FetchFailure, FetchOutcome, HttpTransport, Jitter, Transport};
