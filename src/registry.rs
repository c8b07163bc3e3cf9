//! Provider table and fallback ordering.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::Settings;
use crate::provider::{MarkupRules, ProviderDescriptor, ResponseKind, StructuredFormat};
use crate::{Result, SearchError};

/// Provider table with a default selection and declared fallback preferences.
///
/// The registry is owned by the command layer. Searches borrow it immutably;
/// enable/default changes need `&mut` and therefore never overlap a search.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
    fallbacks: HashMap<String, Vec<String>>,
    default_id: String,
}

impl ProviderRegistry {
    /// Creates a registry from providers in declaration order.
    ///
    /// The first provider becomes the default.
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for provider in &providers {
            if !seen.insert(provider.id().to_string()) {
                return Err(SearchError::Config(format!(
                    "duplicate provider id '{}'",
                    provider.id()
                )));
            }
        }
        let default_id = providers
            .first()
            .map(|p| p.id().to_string())
            .ok_or_else(|| SearchError::Config("registry needs at least one provider".into()))?;

        Ok(Self {
            providers,
            fallbacks: HashMap::new(),
            default_id,
        })
    }

    /// The built-in provider table.
    pub fn builtin() -> Self {
        let providers = builtin_providers();
        let mut fallbacks = HashMap::new();
        for (id, alternates) in BUILTIN_FALLBACKS {
            fallbacks.insert(
                id.to_string(),
                alternates.iter().map(|a| a.to_string()).collect(),
            );
        }
        Self {
            providers,
            fallbacks,
            default_id: "brave".to_string(),
        }
    }

    /// Declares the preferred alternates for `id`, in order.
    pub fn set_fallbacks<I, S>(&mut self, id: &str, alternates: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.get(id)?;
        let alternates: Vec<String> = alternates.into_iter().map(Into::into).collect();
        for alternate in &alternates {
            self.get(alternate)?;
        }
        self.fallbacks.insert(id.to_string(), alternates);
        Ok(())
    }

    /// Looks up a provider by id.
    pub fn get(&self, id: &str) -> Result<&ProviderDescriptor> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| SearchError::UnknownProvider(id.to_string()))
    }

    /// All providers in declaration order.
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Enabled providers in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter().filter(|p| p.is_enabled())
    }

    /// Id of the default provider.
    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// The default provider.
    pub fn default_provider(&self) -> Result<&ProviderDescriptor> {
        self.get(&self.default_id)
    }

    /// Request URL for `query` on provider `id`.
    pub fn build_url(&self, id: &str, query: &str) -> Result<String> {
        Ok(self.get(id)?.build_url(query))
    }

    /// Ordered alternates to try after `failed_id` fails.
    ///
    /// Uses the declared preference list for `failed_id` when there is one,
    /// otherwise every other provider in declaration order. The result never
    /// contains `failed_id`, disabled providers, or duplicates.
    pub fn fallback_order(&self, failed_id: &str) -> Vec<String> {
        let candidates: Vec<&str> = match self.fallbacks.get(failed_id) {
            Some(declared) => declared.iter().map(String::as_str).collect(),
            None => self.providers.iter().map(|p| p.id()).collect(),
        };

        let mut order: Vec<String> = Vec::with_capacity(candidates.len());
        for id in candidates {
            if id == failed_id || order.iter().any(|seen| seen == id) {
                continue;
            }
            if matches!(self.get(id), Ok(p) if p.is_enabled()) {
                order.push(id.to_string());
            }
        }
        order
    }

    /// Enables or disables a provider. The default provider cannot be disabled.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        if !enabled && id == self.default_id {
            return Err(SearchError::Config(format!(
                "cannot disable the default provider '{}'",
                id
            )));
        }
        let provider = self
            .providers
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or_else(|| SearchError::UnknownProvider(id.to_string()))?;
        provider.enabled = enabled;
        debug!(provider = id, enabled, "Provider toggled");
        Ok(())
    }

    /// Selects the default provider. It must exist and be enabled.
    pub fn set_default(&mut self, id: &str) -> Result<()> {
        let provider = self.get(id)?;
        if !provider.is_enabled() {
            return Err(SearchError::ProviderDisabled(id.to_string()));
        }
        self.default_id = id.to_string();
        Ok(())
    }

    /// Applies configured enabled flags, fallback lists and default provider.
    ///
    /// Unknown ids in the settings are ignored with a warning.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        for (id, provider_settings) in &settings.providers {
            match self.providers.iter_mut().find(|p| p.id() == id.as_str()) {
                Some(provider) => provider.enabled = provider_settings.enabled,
                None => warn!(provider = %id, "Ignoring settings for unknown provider"),
            }
        }
        for (id, alternates) in &settings.fallbacks {
            if let Err(e) = self.set_fallbacks(id, alternates.iter().cloned()) {
                warn!(provider = %id, error = %e, "Ignoring fallback list");
            }
        }
        let default = self.get(&settings.default_provider)?;
        if !default.is_enabled() {
            warn!(
                provider = %settings.default_provider,
                "Configured default provider is disabled; searches will fall back"
            );
        }
        self.default_id = settings.default_provider.clone();
        Ok(())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN_FALLBACKS: &[(&str, &[&str])] = &[
    ("ddg", &["brave", "google", "ddg_api"]),
    ("google", &["brave", "ddg_api", "wikipedia"]),
    ("brave", &["google", "ddg_api", "wikipedia"]),
    ("ddg_api", &["brave", "google", "wikipedia"]),
    ("wikipedia", &["brave", "google", "ddg_api"]),
];

fn builtin_providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::new(
            "ddg",
            "DuckDuckGo",
            "https://html.duckduckgo.com/html/",
            ResponseKind::Markup(
                MarkupRules::new("duckduckgo.com")
                    .with_primary(
                        r#"(?s)<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="(?P<url>[^"]+)"[^>]*>(?P<title>.*?)</a>"#,
                    )
                    .with_primary(
                        r#"(?s)<a[^>]*href="(?P<url>[^"]+)"[^>]*class="[^"]*result__a[^"]*"[^>]*>(?P<title>.*?)</a>"#,
                    )
                    .with_snippet(r#"(?s)class="[^"]*result__snippet[^"]*"[^>]*>(?P<snippet>.*?)</a>"#),
            ),
        )
        .with_param("q", "{query}")
        .with_param("kl", "wt-wt"),
        ProviderDescriptor::new(
            "ddg_api",
            "DuckDuckGo API",
            "https://api.duckduckgo.com/",
            ResponseKind::Structured(StructuredFormat::InstantAnswer),
        )
        .with_param("q", "{query}")
        .with_param("format", "json")
        .with_param("no_html", "1"),
        ProviderDescriptor::new(
            "google",
            "Google",
            "https://www.google.com/search",
            ResponseKind::Markup(
                MarkupRules::new("google.com")
                    .with_primary(
                        r#"(?s)<a[^>]+href="(?P<url>[^"]+)"[^>]*>\s*<h3[^>]*>(?P<title>.*?)</h3>"#,
                    )
                    .with_snippet(r#"(?s)class="[^"]*VwiC3b[^"]*"[^>]*>(?P<snippet>.*?)</div>"#),
            ),
        )
        .with_param("q", "{query}")
        .with_param("num", "10"),
        ProviderDescriptor::new(
            "wikipedia",
            "Wikipedia",
            "https://en.wikipedia.org/w/api.php",
            ResponseKind::Structured(StructuredFormat::OpenSearch),
        )
        .with_param("action", "opensearch")
        .with_param("search", "{query}")
        .with_param("limit", "10")
        .with_param("format", "json"),
        ProviderDescriptor::new(
            "brave",
            "Brave Search",
            "https://search.brave.com/search",
            ResponseKind::Markup(
                MarkupRules::new("brave.com")
                    .with_primary(
                        r#"(?s)<a[^>]+data-testid="[^"]*result-title[^"]*"[^>]+href="(?P<url>[^"]+)"[^>]*>(?P<title>.*?)</a>"#,
                    )
                    .with_primary(
                        r#"(?s)<a[^>]+href="(?P<url>https?://[^"]+)"[^>]*>\s*<div[^>]*class="[^"]*search-snippet-title[^"]*"[^>]*>(?P<title>.*?)</div>"#,
                    )
                    .with_snippet(
                        r#"(?s)class="[^"]*(?:snippet-description|generic-snippet)[^"]*"[^>]*>(?P<snippet>.*?)</div>"#,
                    ),
            ),
        )
        .with_param("q", "{query}")
        .with_param("source", "web"),
    ]
}
