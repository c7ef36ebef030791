//! Candidate sources: loading the source list and fetching proxy lists

use crate::error::{Error, Result};
use crate::proxy::models::{Proxy, ProxyScheme};
use crate::proxy::parser::ProxyParser;
use reqwest::Client;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for fetching one source list in seconds
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// One external origin URL supplying candidate proxies of a given scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub scheme: ProxyScheme,
}

impl Source {
    pub fn new(url: impl Into<String>, scheme: ProxyScheme) -> Self {
        Self {
            url: url.into(),
            scheme,
        }
    }
}

/// The set of configured sources, read from a `type,link` CSV file
#[derive(Debug, Default)]
pub struct SourceList {
    sources: Vec<Source>,
}

impl SourceList {
    /// Load sources from a CSV file with a `type,link` header row.
    /// Rows with an unknown type are skipped with a warning.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Configuration(format!(
                "cannot read sources file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        let mut sources = Vec::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((type_field, link)) = line.split_once(',') else {
                continue;
            };
            // header row
            if n == 0 && type_field.eq_ignore_ascii_case("type") {
                continue;
            }
            match ProxyScheme::from_str(type_field.trim()) {
                Ok(scheme) => sources.push(Source::new(link.trim(), scheme)),
                Err(_) => warn!(line, "skipping source row with unknown proxy type"),
            }
        }

        Ok(Self { sources })
    }

    /// Sources supplying the given scheme.
    pub fn for_scheme(&self, scheme: ProxyScheme) -> Vec<&Source> {
        self.sources.iter().filter(|s| s.scheme == scheme).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Downloads and parses candidate lists from sources
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_default_timeout() -> Result<Self> {
        Self::new(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    /// Fetch one source and parse its payload into proxies of the source's
    /// scheme. Errors here mean the source is skipped for the pass; they
    /// never abort other sources.
    pub async fn fetch(&self, source: &Source) -> Result<Vec<Proxy>> {
        debug!(url = %source.url, scheme = %source.scheme, "fetching source");
        let response = self.client.get(&source.url).send().await?;
        if !response.status().is_success() {
            return Err(Error::SourceFetch(format!(
                "{}: HTTP status {}",
                source.url,
                response.status()
            )));
        }
        let content = response.text().await?;
        Ok(ProxyParser::parse_text(&content, source.scheme))
    }
}
