//! Extraction from HTML results pages.

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::{ExtractContext, ExtractionStrategy};
use crate::provider::MarkupRules;
use crate::result::{SearchResult, MAX_RESULTS};
use crate::text::fragment_text;
use crate::{Result, SearchError};

/// Last-resort pattern: any anchor with plain text content.
pub const RELAXED_ANCHOR_PATTERN: &str =
    r#"(?s)<a[^>]+href="(?P<url>[^"]+)"[^>]*>(?P<title>[^<]+)</a>"#;

/// Relaxed matches need more than this many title characters.
const RELAXED_MIN_TITLE_CHARS: usize = 10;

/// Query parameters that carry the real target of a redirect link.
const REDIRECT_PARAMS: &[&str] = &["uddg", "q", "url"];

/// Strategy for HTML responses, driven by a provider's [`MarkupRules`].
#[derive(Debug, Clone, Copy)]
pub struct MarkupStrategy<'r> {
    rules: &'r MarkupRules,
}

impl<'r> MarkupStrategy<'r> {
    pub fn new(rules: &'r MarkupRules) -> Self {
        Self { rules }
    }

    fn primary_pass(
        &self,
        pattern: &Regex,
        snippet: Option<&Regex>,
        ctx: &ExtractContext<'_>,
        base: Option<&Url>,
    ) -> Vec<SearchResult> {
        let matches: Vec<_> = pattern.captures_iter(ctx.body).collect();
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for (i, caps) in matches.iter().enumerate() {
            let (Some(whole), Some(href), Some(title)) =
                (caps.get(0), caps.name("url"), caps.name("title"))
            else {
                continue;
            };
            let Some(url) = self.resolve(href.as_str(), base) else {
                continue;
            };
            let title = fragment_text(title.as_str());
            if title.is_empty() {
                continue;
            }

            let region_end = matches
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(ctx.body.len(), |m| m.start());
            let region = &ctx.body[whole.end()..region_end];
            let snippet = snippet
                .and_then(|re| re.captures(region))
                .and_then(|c| c.name("snippet"))
                .map(|m| fragment_text(m.as_str()))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| {
                    format!("Result from {} for: {}", ctx.provider.name(), ctx.query)
                });

            let result = SearchResult::new(url, title, snippet, ctx.provider.name());
            if seen.insert(result.normalized_url()) {
                results.push(result);
            }
            if results.len() >= MAX_RESULTS {
                break;
            }
        }
        results
    }

    fn relaxed_pass(
        &self,
        pattern: &Regex,
        ctx: &ExtractContext<'_>,
        base: Option<&Url>,
    ) -> Vec<SearchResult> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for caps in pattern.captures_iter(ctx.body) {
            let (Some(href), Some(title)) = (caps.name("url"), caps.name("title")) else {
                continue;
            };
            let title = fragment_text(title.as_str());
            if title.chars().count() <= RELAXED_MIN_TITLE_CHARS {
                continue;
            }
            let Some(url) = self.resolve(href.as_str(), base) else {
                continue;
            };
            let result = SearchResult::new(
                url,
                title,
                format!("Search result for: {}", ctx.query),
                ctx.provider.name(),
            );
            if seen.insert(result.normalized_url()) {
                results.push(result);
            }
            if results.len() >= MAX_RESULTS {
                break;
            }
        }
        results
    }

    /// Turns a raw `href` into an absolute result URL, or `None` when the link
    /// is not a result (page chrome, scripts, fragments, the provider itself).
    fn resolve(&self, href: &str, base: Option<&Url>) -> Option<String> {
        let href = fragment_text(href);
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            return None;
        }

        let url = if let Some(rest) = href.strip_prefix("//") {
            Url::parse(&format!("https://{}", rest)).ok()?
        } else {
            match Url::parse(&href) {
                Ok(url) => url,
                Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(&href).ok()?,
                Err(_) => return None,
            }
        };
        let url = unwrap_redirect(url);

        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if is_own_domain(&url, &self.rules.own_domain) {
            return None;
        }
        Some(url.to_string())
    }
}

impl ExtractionStrategy for MarkupStrategy<'_> {
    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<Vec<SearchResult>> {
        let base = Url::parse(ctx.request_url).ok();
        let snippet = self.rules.snippet.as_deref().map(compile).transpose()?;

        for (i, source) in self.rules.primary.iter().enumerate() {
            let pattern = compile(source)?;
            let results = self.primary_pass(&pattern, snippet.as_ref(), ctx, base.as_ref());
            if !results.is_empty() {
                debug!(
                    provider = ctx.provider.id(),
                    pattern = i,
                    count = results.len(),
                    "Primary pattern matched"
                );
                return Ok(results);
            }
        }

        let relaxed = compile(RELAXED_ANCHOR_PATTERN)?;
        let results = self.relaxed_pass(&relaxed, ctx, base.as_ref());
        debug!(provider = ctx.provider.id(), count = results.len(), "Relaxed anchor scan");
        Ok(results)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| SearchError::Parse(format!("invalid pattern: {}", e)))
}

/// Follows provider redirect links such as `/l/?uddg=` and `/url?q=`.
fn unwrap_redirect(url: Url) -> Url {
    let target = url
        .query_pairs()
        .find(|(key, value)| {
            let key: &str = key;
            REDIRECT_PARAMS.contains(&key)
                && (key == "uddg" || url.path() == "/url")
                && value.starts_with("http")
        })
        .and_then(|(_, value)| Url::parse(&value).ok());
    target.unwrap_or(url)
}

fn is_own_domain(url: &Url, own_domain: &str) -> bool {
    if own_domain.is_empty() {
        return false;
    }
    match url.host_str() {
        Some(host) => {
            let host = host.to_ascii_lowercase();
            host == own_domain || host.ends_with(&format!(".{}", own_domain))
        }
        None => false,
    }
}
