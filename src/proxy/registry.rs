//! Dead-proxy registry: a durable, time-bounded exclusion set
//!
//! Proxies confirmed dead are skipped on later passes instead of re-probed.
//! Entries expire after a retention window so a flaky proxy gets a second
//! chance and permanently-dead entries do not grow the file unbounded.

use crate::error::Result;
use crate::proxy::models::{Proxy, ProxyScheme};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Durable set of proxies known to be dead, keyed by full proxy identity.
///
/// Mutations happen only in memory; `save` rewrites the file once per
/// validation pass.
#[derive(Debug)]
pub struct DeadRegistry {
    path: PathBuf,
    retention: Duration,
    entries: HashMap<Proxy, DateTime<Utc>>,
}

impl DeadRegistry {
    /// Load the registry from disk, discarding entries older than the
    /// retention window. Lines in an older file format, without a usable
    /// timestamp, are kept and stamped with the current time. The file is
    /// rewritten immediately when anything was pruned or adopted, so
    /// expired and legacy entries never survive a load.
    pub fn load<P: AsRef<Path>>(path: P, retention_days: i64) -> Result<Self> {
        let mut registry = Self {
            path: path.as_ref().to_path_buf(),
            retention: Duration::days(retention_days),
            entries: HashMap::new(),
        };

        if !registry.path.exists() {
            return Ok(registry);
        }

        let cutoff = Utc::now() - registry.retention;
        let content = fs::read_to_string(&registry.path)?;
        let mut expired = 0usize;
        let mut adopted = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match Self::parse_entry(line) {
                Some((proxy, Some(first_seen))) => {
                    if first_seen >= cutoff {
                        registry.entries.insert(proxy, first_seen);
                    } else {
                        expired += 1;
                    }
                }
                // legacy line without a usable timestamp: adopt as seen now
                Some((proxy, None)) => {
                    registry.entries.insert(proxy, Utc::now());
                    adopted += 1;
                }
                None => warn!(line, "skipping unparseable dead-proxy entry"),
            }
        }

        if expired > 0 || adopted > 0 {
            registry.save()?;
            info!(expired, adopted, "rewrote dead-proxy registry on load");
        }
        info!(count = registry.entries.len(), "loaded dead-proxy registry");

        Ok(registry)
    }

    /// Fresh in-memory registry backed by the given path.
    pub fn empty<P: AsRef<Path>>(path: P, retention_days: i64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            retention: Duration::days(retention_days),
            entries: HashMap::new(),
        }
    }

    /// O(1) membership test, used as a pre-filter before probing.
    pub fn contains(&self, proxy: &Proxy) -> bool {
        self.entries.contains_key(proxy)
    }

    /// Record a proxy found dead. Idempotent: the first-seen timestamp is
    /// kept on re-record.
    pub fn record(&mut self, proxy: &Proxy) {
        self.entries
            .entry(proxy.clone())
            .or_insert_with(Utc::now);
    }

    /// Number of tracked dead proxies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the registry file. Called once per validation pass rather
    /// than per record.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = String::new();
        content.push_str("# Dead proxies with first-seen timestamps\n");
        content.push_str("# Format: host:port,scheme,rfc3339-timestamp\n");
        content.push_str(&format!(
            "# Entries older than {} days are removed on load\n",
            self.retention.num_days()
        ));

        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort();
        for (proxy, first_seen) in entries {
            content.push_str(&format!(
                "{},{},{}\n",
                proxy.addr(),
                proxy.scheme,
                first_seen.to_rfc3339()
            ));
        }

        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Parse one registry line. A parseable `host:port,scheme` prefix with a
    /// missing or unparseable timestamp yields `(proxy, None)`; the caller
    /// adopts such legacy entries with the current time.
    fn parse_entry(line: &str) -> Option<(Proxy, Option<DateTime<Utc>>)> {
        let mut parts = line.splitn(3, ',');
        let addr = parts.next()?;
        let scheme = ProxyScheme::from_str(parts.next()?.trim()).ok()?;

        let (host, port) = addr.split_once(':')?;
        let port: u16 = port.parse().ok()?;
        let first_seen = parts
            .next()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Some((Proxy::new(host, port, scheme), first_seen))
    }

    #[cfg(test)]
    fn insert_at(&mut self, proxy: Proxy, first_seen: DateTime<Utc>) {
        self.entries.insert(proxy, first_seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn proxy(host: &str) -> Proxy {
        Proxy::new(host, 8080, ProxyScheme::Http)
    }

    #[test]
    fn test_record_and_contains() {
        let dir = tempdir().unwrap();
        let mut registry = DeadRegistry::empty(dir.path().join("dead.txt"), 30);

        assert!(!registry.contains(&proxy("1.1.1.1")));
        registry.record(&proxy("1.1.1.1"));
        assert!(registry.contains(&proxy("1.1.1.1")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut registry = DeadRegistry::empty(dir.path().join("dead.txt"), 30);

        let old = Utc::now() - Duration::days(5);
        registry.insert_at(proxy("1.1.1.1"), old);
        registry.record(&proxy("1.1.1.1"));

        // first-seen timestamp wins
        assert_eq!(registry.entries[&proxy("1.1.1.1")], old);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dead.txt");

        let mut registry = DeadRegistry::empty(&path, 30);
        registry.record(&proxy("1.1.1.1"));
        registry.record(&Proxy::new("2.2.2.2", 1080, ProxyScheme::Socks5));
        registry.save().unwrap();

        let loaded = DeadRegistry::load(&path, 30).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&proxy("1.1.1.1")));
        assert!(loaded.contains(&Proxy::new("2.2.2.2", 1080, ProxyScheme::Socks5)));
    }

    #[test]
    fn test_retention_boundary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dead.txt");

        let mut registry = DeadRegistry::empty(&path, 30);
        registry.insert_at(proxy("29.0.0.1"), Utc::now() - Duration::days(29));
        registry.insert_at(proxy("31.0.0.1"), Utc::now() - Duration::days(31));
        registry.save().unwrap();

        let loaded = DeadRegistry::load(&path, 30).unwrap();
        assert!(loaded.contains(&proxy("29.0.0.1")));
        assert!(!loaded.contains(&proxy("31.0.0.1")));
    }

    #[test]
    fn test_load_prunes_expired_entries_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dead.txt");

        let mut registry = DeadRegistry::empty(&path, 30);
        registry.insert_at(proxy("31.0.0.1"), Utc::now() - Duration::days(31));
        registry.save().unwrap();

        let _ = DeadRegistry::load(&path, 30).unwrap();

        // the expired entry must be gone from the file itself
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("31.0.0.1"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let registry = DeadRegistry::load(dir.path().join("nope.txt"), 30).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_legacy_entries_without_timestamp_are_adopted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dead.txt");
        fs::write(
            &path,
            "1.1.1.1:8080,http\n2.2.2.2:1080,socks5,not-a-date\n",
        )
        .unwrap();

        let registry = DeadRegistry::load(&path, 30).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&proxy("1.1.1.1")));
        assert!(registry.contains(&Proxy::new("2.2.2.2", 1080, ProxyScheme::Socks5)));

        // the file is rewritten with full timestamps on load
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.lines().any(|l| l.starts_with("1.1.1.1:8080,http,")));
        let reloaded = DeadRegistry::load(&path, 30).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_load_skips_garbage_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dead.txt");
        fs::write(
            &path,
            format!(
                "# comment\nnot-a-proxy\n1.1.1.1:8080,http,{}\n",
                Utc::now().to_rfc3339()
            ),
        )
        .unwrap();

        let registry = DeadRegistry::load(&path, 30).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
