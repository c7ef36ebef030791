//! Parsing of proxy list text in the formats public sources publish

use crate::proxy::models::{Proxy, ProxyScheme};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern to match IP:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b").expect("invalid IP:PORT regex")
});

/// Proxy list parser
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line.
    ///
    /// Supports formats:
    /// - IP:PORT
    /// - scheme://IP:PORT (an `https://` prefix is treated as `http`)
    ///
    /// Comment lines, blank lines, and unsupported schemes yield `None`.
    pub fn parse_line(line: &str, default_scheme: ProxyScheme) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (scheme, rest) = match line.split_once("://") {
            Some(("http", rest)) | Some(("https", rest)) => (ProxyScheme::Http, rest),
            Some(("socks5", rest)) => (ProxyScheme::Socks5, rest),
            // socks4 and anything else with a scheme prefix is unsupported
            Some(_) => return None,
            None => (default_scheme, line),
        };

        let rest = rest.trim_end_matches('/');
        let (host, port) = rest.split_once(':')?;
        // a comma in the host would corrupt the CSV ledger and registry rows
        if host.is_empty() || host.contains(['/', '@', ',']) {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }

        Some(Proxy::new(host, port, scheme))
    }

    /// Parse proxies from multi-line text, deduplicating on identity.
    ///
    /// Tries line-by-line parsing first; if nothing matches (HTML source
    /// pages, for example), falls back to regex IP:PORT extraction.
    pub fn parse_text(content: &str, default_scheme: ProxyScheme) -> Vec<Proxy> {
        let mut proxies: Vec<Proxy> = content
            .lines()
            .filter_map(|line| Self::parse_line(line, default_scheme))
            .collect();

        if proxies.is_empty() {
            proxies = Self::extract_with_regex(content, default_scheme);
        }

        proxies.sort();
        proxies.dedup();
        proxies
    }

    /// Extract proxies using regex pattern matching
    fn extract_with_regex(content: &str, scheme: ProxyScheme) -> Vec<Proxy> {
        IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;

                for part in host.split('.') {
                    let octet: u32 = part.parse().ok()?;
                    if octet > 255 {
                        return None;
                    }
                }
                if port == 0 {
                    return None;
                }

                Some(Proxy::new(host, port, scheme))
            })
            .collect()
    }
}
