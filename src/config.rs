//! Client settings.
//!
//! [`Settings`] is the configuration surface the core reads at call time:
//! per-provider enabled flags, the default provider, and whether the
//! anonymizing transport is on. Persisting it is the caller's job; this module
//! only loads and validates.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::proxy::{ProxyConfig, ProxyProtocol, DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT};
use crate::transport::Jitter;
use crate::{Result, SearchError};

/// Per-provider settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub enabled: bool,
}

/// Configuration consumed by the registry, transport and orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Provider used when a search names none.
    pub default_provider: String,
    /// Enabled flags keyed by provider id. Missing ids keep their built-in state.
    pub providers: BTreeMap<String, ProviderSettings>,
    /// Fallback preference lists keyed by provider id, replacing the built-in ones.
    pub fallbacks: BTreeMap<String, Vec<String>>,
    /// Route requests through the local SOCKS proxy.
    pub anonymize: bool,
    /// Per-request time budget in seconds, courtesy delay included.
    pub timeout_secs: u64,
    /// Courtesy delay range in milliseconds `[min, max]`.
    pub jitter_ms: (u64, u64),
    /// SOCKS listener host.
    pub socks_host: String,
    /// SOCKS listener port.
    pub socks_port: u16,
    /// `socks5h` resolves host names on the proxy, `socks5` locally.
    pub socks_protocol: ProxyProtocol,
    /// Tor executable used by the anonymizer control.
    pub tor_binary: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: "brave".to_string(),
            providers: BTreeMap::new(),
            fallbacks: BTreeMap::new(),
            anonymize: false,
            timeout_secs: 10,
            jitter_ms: (500, 2000),
            socks_host: DEFAULT_SOCKS_HOST.to_string(),
            socks_port: DEFAULT_SOCKS_PORT,
            socks_protocol: ProxyProtocol::default(),
            tor_binary: "tor".to_string(),
        }
    }
}

impl Settings {
    /// Parses and validates settings from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads and validates settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Checks field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.default_provider.trim().is_empty() {
            return Err(SearchError::Config("default_provider must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(SearchError::Config("timeout_secs must be greater than 0".into()));
        }
        if self.jitter_ms.0 > self.jitter_ms.1 {
            return Err(SearchError::Config("jitter_ms min must be <= max".into()));
        }
        if self.socks_port == 0 {
            return Err(SearchError::Config("socks_port must be non-zero".into()));
        }
        Ok(())
    }

    /// Request time budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Courtesy delay range.
    pub fn jitter(&self) -> Jitter {
        Jitter::new(self.jitter_ms.0, self.jitter_ms.1)
    }

    /// SOCKS endpoint of the anonymizing transport.
    pub fn proxy(&self) -> ProxyConfig {
        ProxyConfig::new(self.socks_host.clone(), self.socks_port)
            .with_protocol(self.socks_protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.default_provider, "brave");
        assert!(!settings.anonymize);
        assert_eq!(settings.timeout(), Duration::from_secs(10));
        assert_eq!(settings.jitter(), Jitter::new(500, 2000));
        assert_eq!(settings.proxy().url(), "socks5h://127.0.0.1:9050");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_from_partial_json() {
        let json = r#"{
            "default_provider": "ddg_api",
            "providers": {"google": {"enabled": false}},
            "anonymize": true
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        assert_eq!(settings.default_provider, "ddg_api");
        assert!(settings.anonymize);
        assert_eq!(settings.providers["google"], ProviderSettings { enabled: false });
        assert_eq!(settings.timeout_secs, 10);
        assert!(settings.fallbacks.is_empty());
    }

    #[test]
    fn test_settings_fallbacks() {
        let json = r#"{"fallbacks": {"brave": ["wikipedia", "ddg_api"]}}"#;
        let settings = Settings::from_json_str(json).unwrap();
        assert_eq!(settings.fallbacks["brave"], vec!["wikipedia", "ddg_api"]);
    }

    #[test]
    fn test_settings_socks_protocol() {
        let json = r#"{
            "socks_host": "10.0.0.2",
            "socks_port": 1080,
            "socks_protocol": "socks5"
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        assert_eq!(settings.socks_protocol, ProxyProtocol::Socks5);
        assert_eq!(settings.proxy().url(), "socks5://10.0.0.2:1080");

        let result = Settings::from_json_str(r#"{"socks_protocol": "http"}"#);
        assert!(matches!(result, Err(SearchError::Json(_))));
    }

    #[test]
    fn test_settings_rejects_zero_timeout() {
        let result = Settings::from_json_str(r#"{"timeout_secs": 0}"#);
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_settings_rejects_inverted_jitter() {
        let result = Settings::from_json_str(r#"{"jitter_ms": [900, 100]}"#);
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_settings_rejects_malformed_json() {
        let result = Settings::from_json_str("{not json");
        assert!(matches!(result, Err(SearchError::Json(_))));
    }

    #[test]
    fn test_settings_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_provider": "wikipedia"}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.default_provider, "wikipedia");
    }

    #[test]
    fn test_settings_load_missing_file() {
        let result = Settings::load("/nonexistent/veil-search/config.json");
        assert!(matches!(result, Err(SearchError::Io(_))));
    }

    #[test]
    fn test_settings_round_trip_keys() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"default_provider\":\"brave\""));
        assert!(json.contains("\"jitter_ms\":[500,2000]"));
        assert!(json.contains("\"socks_protocol\":\"socks5h\""));
    }
}
