//! Local SOCKS proxy endpoint used for anonymizing transport.
//!
//! The anonymizing transport is a single local SOCKS listener (normally a Tor
//! daemon). Host names are resolved on the proxy side so DNS lookups do not
//! leak outside the tunnel.

use reqwest::Proxy as ReqwestProxy;
use serde::{Deserialize, Serialize};

use crate::{Result, SearchError};

/// Default SOCKS listener address.
pub const DEFAULT_SOCKS_HOST: &str = "127.0.0.1";

/// Default SOCKS listener port.
pub const DEFAULT_SOCKS_PORT: u16 = 9050;

/// Proxy protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    /// SOCKS5 with remote DNS resolution.
    #[default]
    Socks5h,
    /// SOCKS5 with local DNS resolution.
    Socks5,
}

/// A SOCKS proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host (IP or domain)
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Proxy protocol
    pub protocol: ProxyProtocol,
}

impl ProxyConfig {
    /// Creates a new proxy configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: ProxyProtocol::Socks5h,
        }
    }

    /// Sets the proxy protocol.
    pub fn with_protocol(mut self, protocol: ProxyProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Returns the proxy URL string.
    pub fn url(&self) -> String {
        let scheme = match self.protocol {
            ProxyProtocol::Socks5h => "socks5h",
            ProxyProtocol::Socks5 => "socks5",
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Returns `host:port`, suitable for a TCP readiness probe.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the reqwest proxy routing all schemes through this endpoint.
    pub fn to_reqwest(&self) -> Result<ReqwestProxy> {
        ReqwestProxy::all(self.url())
            .map_err(|e| SearchError::Other(format!("Failed to create proxy: {}", e)))
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKS_HOST, DEFAULT_SOCKS_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_protocol_default() {
        assert_eq!(ProxyProtocol::default(), ProxyProtocol::Socks5h);
    }

    #[test]
    fn test_proxy_config_default() {
        let proxy = ProxyConfig::default();
        assert_eq!(proxy.host, "127.0.0.1");
        assert_eq!(proxy.port, 9050);
        assert_eq!(proxy.url(), "socks5h://127.0.0.1:9050");
    }

    #[test]
    fn test_proxy_config_url_socks5() {
        let proxy = ProxyConfig::new("10.0.0.2", 1080).with_protocol(ProxyProtocol::Socks5);
        assert_eq!(proxy.url(), "socks5://10.0.0.2:1080");
    }

    #[test]
    fn test_proxy_protocol_serialization() {
        assert_eq!(serde_json::to_string(&ProxyProtocol::Socks5h).unwrap(), "\"socks5h\"");
        let protocol: ProxyProtocol = serde_json::from_str("\"socks5\"").unwrap();
        assert_eq!(protocol, ProxyProtocol::Socks5);
    }

    #[test]
    fn test_proxy_config_socket_addr() {
        let proxy = ProxyConfig::new("localhost", 9150);
        assert_eq!(proxy.socket_addr(), "localhost:9150");
    }

    #[test]
    fn test_proxy_config_to_reqwest() {
        assert!(ProxyConfig::default().to_reqwest().is_ok());
    }
}
