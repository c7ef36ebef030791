//! Runtime configuration, loaded from a TOML file with per-field defaults

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration for a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool size for concurrent probes
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-probe timeout in seconds (connect + full request)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Maximum proxies kept per pool
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    /// Days a dead entry is retained before it may be re-tested
    #[serde(default = "default_dead_retention_days")]
    pub dead_retention_days: i64,
    /// Days of ledger history the analyzer considers
    #[serde(default = "default_analysis_window_days")]
    pub analysis_window_days: i64,
    /// Admissions per batch between pool saves
    #[serde(default = "default_save_batch")]
    pub save_batch: usize,
    /// Endpoint probed through each proxy
    #[serde(default = "default_test_url")]
    pub test_url: String,
    /// Timeout in seconds for fetching a source list
    #[serde(default = "default_source_fetch_timeout_secs")]
    pub source_fetch_timeout_secs: u64,
    /// Directory holding pool files, the registry, and the ledger
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// CSV file of proxy sources (`type,link` rows)
    #[serde(default = "default_sources_file")]
    pub sources_file: PathBuf,
    /// JSON file of request header sets for probe randomization
    #[serde(default = "default_headers_file")]
    pub headers_file: PathBuf,
}

fn default_workers() -> usize {
    // Sized to the machine, capped so the echo target is not overwhelmed
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus * 8).clamp(25, 150)
}
fn default_probe_timeout_secs() -> u64 {
    3
}
fn default_pool_capacity() -> usize {
    1000
}
fn default_dead_retention_days() -> i64 {
    30
}
fn default_analysis_window_days() -> i64 {
    7
}
fn default_save_batch() -> usize {
    50
}
fn default_test_url() -> String {
    "http://httpbin.org/ip".to_string()
}
fn default_source_fetch_timeout_secs() -> u64 {
    30
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_sources_file() -> PathBuf {
    PathBuf::from("sources.csv")
}
fn default_headers_file() -> PathBuf {
    PathBuf::from("data/headers.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            probe_timeout_secs: default_probe_timeout_secs(),
            pool_capacity: default_pool_capacity(),
            dead_retention_days: default_dead_retention_days(),
            analysis_window_days: default_analysis_window_days(),
            save_batch: default_save_batch(),
            test_url: default_test_url(),
            source_fetch_timeout_secs: default_source_fetch_timeout_secs(),
            data_dir: default_data_dir(),
            sources_file: default_sources_file(),
            headers_file: default_headers_file(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; missing fields take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        info!(path = %path.as_ref().display(), "loaded configuration");
        Ok(config)
    }

    /// Reject invalid parameters before any probing starts.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Configuration("workers must be > 0".into()));
        }
        if self.probe_timeout_secs == 0 {
            return Err(Error::Configuration("probe_timeout_secs must be > 0".into()));
        }
        if self.pool_capacity == 0 {
            return Err(Error::Configuration("pool_capacity must be > 0".into()));
        }
        if self.dead_retention_days <= 0 {
            return Err(Error::Configuration(
                "dead_retention_days must be > 0".into(),
            ));
        }
        if self.analysis_window_days <= 0 {
            return Err(Error::Configuration(
                "analysis_window_days must be > 0".into(),
            ));
        }
        if self.save_batch == 0 {
            return Err(Error::Configuration("save_batch must be > 0".into()));
        }
        if self.test_url.is_empty() {
            return Err(Error::Configuration("test_url must not be empty".into()));
        }
        Ok(())
    }

    /// Pool file for one proxy type, e.g. `data/http.txt`.
    pub fn pool_file(&self, scheme: crate::proxy::ProxyScheme) -> PathBuf {
        self.data_dir.join(format!("{scheme}.txt"))
    }

    /// Dead-proxy registry file.
    pub fn dead_proxies_file(&self) -> PathBuf {
        self.data_dir.join("dead_proxies.txt")
    }

    /// Validation ledger file.
    pub fn ledger_file(&self) -> PathBuf {
        self.data_dir.join("proxy_validation_log.csv")
    }
}
