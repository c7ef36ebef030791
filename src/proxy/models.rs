//! Proxy data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proxy scheme enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Socks5,
}

impl ProxyScheme {
    /// Both schemes the system maintains a pool for.
    pub const ALL: [ProxyScheme; 2] = [ProxyScheme::Http, ProxyScheme::Socks5];
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyScheme::Http => write!(f, "http"),
            ProxyScheme::Socks5 => write!(f, "socks5"),
        }
    }
}

impl FromStr for ProxyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ProxyScheme::Http),
            "socks5" => Ok(ProxyScheme::Socks5),
            other => Err(format!("unknown proxy scheme: {other}. Use: http, socks5")),
        }
    }
}

/// A single proxy endpoint. Identity is the full (host, port, scheme) triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub scheme: ProxyScheme,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16, scheme: ProxyScheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Address in `host:port` form, as stored in pool files.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full URL in `scheme://host:port` form, as consumed by reqwest.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// A proxy queued for validation, with the source URL it was fetched from.
/// `source = None` marks a proxy re-validated from an existing pool.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub proxy: Proxy,
    pub source: Option<String>,
}

impl Candidate {
    pub fn new(proxy: Proxy, source: Option<String>) -> Self {
        Self { proxy, source }
    }

    /// Candidate from an existing pool, with no originating source.
    pub fn existing(proxy: Proxy) -> Self {
        Self {
            proxy,
            source: None,
        }
    }
}

/// Result of one probe attempt. Produced once, never mutated.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub proxy: Proxy,
    pub alive: bool,
    /// Elapsed wall-clock time, present iff the probe succeeded.
    pub latency_ms: Option<u64>,
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn alive(proxy: Proxy, latency_ms: u64, source: Option<String>) -> Self {
        Self {
            proxy,
            alive: true,
            latency_ms: Some(latency_ms),
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn dead(proxy: Proxy, source: Option<String>) -> Self {
        Self {
            proxy,
            alive: false,
            latency_ms: None,
            source,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_creation() {
        let proxy = Proxy::new("127.0.0.1", 8080, ProxyScheme::Http);
        assert_eq!(proxy.host, "127.0.0.1");
        assert_eq!(proxy.port, 8080);
        assert_eq!(proxy.scheme, ProxyScheme::Http);
    }

    #[test]
    fn test_proxy_addr_and_url() {
        let proxy = Proxy::new("192.168.1.1", 1080, ProxyScheme::Socks5);
        assert_eq!(proxy.addr(), "192.168.1.1:1080");
        assert_eq!(proxy.url(), "socks5://192.168.1.1:1080");
    }

    #[test]
    fn test_scheme_roundtrip() {
        assert_eq!("http".parse::<ProxyScheme>().unwrap(), ProxyScheme::Http);
        assert_eq!(
            "SOCKS5".parse::<ProxyScheme>().unwrap(),
            ProxyScheme::Socks5
        );
        assert!("socks4".parse::<ProxyScheme>().is_err());
        assert_eq!(ProxyScheme::Socks5.to_string(), "socks5");
    }

    #[test]
    fn test_identity_includes_scheme() {
        let http = Proxy::new("1.2.3.4", 80, ProxyScheme::Http);
        let socks = Proxy::new("1.2.3.4", 80, ProxyScheme::Socks5);
        assert_ne!(http, socks);
    }

    #[test]
    fn test_probe_outcome() {
        let proxy = Proxy::new("127.0.0.1", 8080, ProxyScheme::Http);

        let outcome = ProbeOutcome::alive(proxy.clone(), 120, Some("http://src".to_string()));
        assert!(outcome.alive);
        assert_eq!(outcome.latency_ms, Some(120));

        let outcome = ProbeOutcome::dead(proxy, None);
        assert!(!outcome.alive);
        assert!(outcome.latency_ms.is_none());
    }
}
