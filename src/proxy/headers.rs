//! Randomized request-header pool for probe traffic
//!
//! Probes that always present the same User-Agent get blocked by some echo
//! targets; each probe instead draws a full header set at random from a
//! configurable pool.

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// On-disk shape of the header pool file: `{"headers": [{name: value, ...}]}`
#[derive(serde::Deserialize)]
struct HeaderFile {
    headers: Vec<BTreeMap<String, String>>,
}

/// Pool of complete header sets, one of which is drawn per probe
#[derive(Debug, Clone)]
pub struct HeaderPool {
    sets: Vec<Vec<(String, String)>>,
}

impl HeaderPool {
    /// Load header sets from a JSON file, falling back to the built-in sets
    /// when the file is missing or malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<HeaderFile>(&content) {
                Ok(file) if !file.headers.is_empty() => {
                    debug!(count = file.headers.len(), path = %path.display(), "loaded header pool");
                    Self {
                        sets: file
                            .headers
                            .into_iter()
                            .map(|set| set.into_iter().collect())
                            .collect(),
                    }
                }
                Ok(_) => {
                    warn!(path = %path.display(), "header pool file is empty, using fallback headers");
                    Self::fallback()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "malformed header pool file, using fallback headers");
                    Self::fallback()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "no header pool file, using fallback headers");
                Self::fallback()
            }
        }
    }

    /// Built-in realistic browser header sets.
    pub fn fallback() -> Self {
        let chrome_windows = vec![
            (
                "User-Agent".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36".to_string(),
            ),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
            ("Accept-Encoding".to_string(), "gzip, deflate".to_string()),
            ("Connection".to_string(), "keep-alive".to_string()),
        ];
        let chrome_macos = vec![
            (
                "User-Agent".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36".to_string(),
            ),
            (
                "Accept".to_string(),
                "application/json,text/plain,*/*".to_string(),
            ),
            ("Accept-Language".to_string(), "en-GB,en;q=0.9".to_string()),
            ("Accept-Encoding".to_string(), "gzip, deflate, br".to_string()),
            ("Connection".to_string(), "keep-alive".to_string()),
        ];
        Self {
            sets: vec![chrome_windows, chrome_macos],
        }
    }

    /// Number of header sets in the pool.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Draw a random header set as a ready-to-send `HeaderMap`.
    /// Entries that are not valid header names/values are dropped.
    pub fn random(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        let set = self
            .sets
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default();
        for (name, value) in set {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                map.insert(name, value);
            }
        }
        map
    }
}
