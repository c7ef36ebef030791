//! Pool manager: the capped, deduplicated, persisted set of alive proxies
//!
//! One pool exists per proxy scheme; operations never cross pool boundaries.

use crate::error::Result;
use crate::proxy::models::{ProbeOutcome, Proxy, ProxyScheme};
use crate::proxy::parser::ProxyParser;
use crate::proxy::registry::DeadRegistry;
use crate::proxy::validator::ValidationReport;
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default maximum pool size per proxy type
pub const DEFAULT_CAPACITY: usize = 1000;

/// Counts from one `admit` call
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AdmitStats {
    /// New proxies added to the pool
    pub admitted: usize,
    /// Already-present proxies ignored
    pub duplicates: usize,
    /// Alive proxies dropped because the pool hit capacity.
    /// Deliberately not registered as dead: they were alive, just surplus.
    pub discarded: usize,
}

/// Capped, deduplicated set of currently-alive proxies of one scheme.
/// Arrival order is kept; first-validated-alive wins a slot.
#[derive(Debug)]
pub struct ProxyPool {
    scheme: ProxyScheme,
    capacity: usize,
    path: PathBuf,
    entries: Vec<Proxy>,
    index: HashSet<Proxy>,
}

impl ProxyPool {
    /// Empty pool backed by the given file.
    pub fn new<P: AsRef<Path>>(path: P, scheme: ProxyScheme, capacity: usize) -> Self {
        Self {
            scheme,
            capacity,
            path: path.as_ref().to_path_buf(),
            entries: Vec::new(),
            index: HashSet::new(),
        }
    }

    /// Load a pool from its file. Missing file yields an empty pool.
    /// Lines are deduplicated and the capacity is enforced on load.
    pub fn load<P: AsRef<Path>>(path: P, scheme: ProxyScheme, capacity: usize) -> Result<Self> {
        let mut pool = Self::new(&path, scheme, capacity);

        if !pool.path.exists() {
            debug!(scheme = %scheme, "no existing pool file");
            return Ok(pool);
        }

        let content = fs::read_to_string(&pool.path)?;
        for line in content.lines() {
            if pool.entries.len() >= pool.capacity {
                break;
            }
            if let Some(proxy) = ProxyParser::parse_line(line, scheme) {
                pool.insert(proxy);
            }
        }

        info!(scheme = %scheme, count = pool.len(), "loaded proxy pool");
        Ok(pool)
    }

    /// Remove every proxy the report found dead and record each removal in
    /// the dead-proxy registry. Idempotent: repeating the same report
    /// changes nothing further.
    pub fn reconcile(&mut self, report: &ValidationReport, registry: &mut DeadRegistry) {
        let mut evicted = 0usize;
        for outcome in &report.dead {
            if self.index.remove(&outcome.proxy) {
                self.entries.retain(|p| p != &outcome.proxy);
                evicted += 1;
            }
            registry.record(&outcome.proxy);
        }
        if evicted > 0 {
            info!(scheme = %self.scheme, evicted, "evicted dead proxies from pool");
        }
    }

    /// Add alive proxies, deduplicating against current membership and
    /// stopping at capacity. Surplus alive proxies are discarded for this
    /// pass.
    pub fn admit(&mut self, alive: &[ProbeOutcome]) -> AdmitStats {
        let mut stats = AdmitStats::default();

        for outcome in alive {
            debug_assert!(outcome.alive);
            if self.index.contains(&outcome.proxy) {
                stats.duplicates += 1;
            } else if self.entries.len() >= self.capacity {
                stats.discarded += 1;
            } else {
                self.insert(outcome.proxy.clone());
                stats.admitted += 1;
            }
        }

        if stats.discarded > 0 {
            info!(
                scheme = %self.scheme,
                discarded = stats.discarded,
                "pool at capacity, surplus alive proxies discarded"
            );
        }
        stats
    }

    /// Rewrite the pool file: comment header plus one `host:port` per line.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = String::new();
        content.push_str(&format!(
            "# Validated {} proxies - Updated: {}\n",
            self.scheme.to_string().to_uppercase(),
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));
        content.push_str(&format!("# Total proxies: {}\n", self.entries.len()));
        content.push_str("# Format: IP:PORT\n\n");
        for proxy in &self.entries {
            content.push_str(&proxy.addr());
            content.push('\n');
        }

        fs::write(&self.path, content)?;
        debug!(scheme = %self.scheme, count = self.len(), path = %self.path.display(), "saved pool");
        Ok(())
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, proxy: &Proxy) -> bool {
        self.index.contains(proxy)
    }

    /// Remove the given proxies from the pool, if present.
    pub fn remove_all(&mut self, proxies: &[Proxy]) {
        for proxy in proxies {
            if self.index.remove(proxy) {
                self.entries.retain(|p| p != proxy);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proxy> {
        self.entries.iter()
    }

    fn insert(&mut self, proxy: Proxy) {
        if self.index.insert(proxy.clone()) {
            self.entries.push(proxy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn proxy(host: &str) -> Proxy {
        Proxy::new(host, 8080, ProxyScheme::Http)
    }

    fn alive_outcome(host: &str) -> ProbeOutcome {
        ProbeOutcome::alive(proxy(host), 100, None)
    }

    fn dead_outcome(host: &str) -> ProbeOutcome {
        ProbeOutcome::dead(proxy(host), None)
    }

    fn pool_with(dir: &Path, hosts: &[&str], capacity: usize) -> ProxyPool {
        let mut pool = ProxyPool::new(dir.join("http.txt"), ProxyScheme::Http, capacity);
        let outcomes: Vec<_> = hosts.iter().map(|h| alive_outcome(h)).collect();
        pool.admit(&outcomes);
        pool
    }

    #[test]
    fn test_admit_dedupes() {
        let dir = tempdir().unwrap();
        let mut pool = pool_with(dir.path(), &["1.1.1.1"], 10);

        let stats = pool.admit(&[alive_outcome("1.1.1.1"), alive_outcome("2.2.2.2")]);
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_admit_respects_capacity() {
        let dir = tempdir().unwrap();
        // pool one below capacity; five new alive candidates arrive
        let hosts: Vec<String> = (0..999).map(|i| format!("10.0.{}.{}", i / 250, i % 250)).collect();
        let host_refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
        let mut pool = pool_with(dir.path(), &host_refs, DEFAULT_CAPACITY);
        assert_eq!(pool.len(), 999);

        let fresh: Vec<_> = (0..5).map(|i| alive_outcome(&format!("20.0.0.{i}"))).collect();
        let stats = pool.admit(&fresh);

        assert_eq!(pool.len(), DEFAULT_CAPACITY);
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.discarded, 4);
        // first-validated-alive wins the last slot
        assert!(pool.contains(&proxy("20.0.0.0")));
    }

    #[test]
    fn test_pool_never_exceeds_capacity() {
        let dir = tempdir().unwrap();
        let mut pool = pool_with(dir.path(), &[], 3);
        let fresh: Vec<_> = (0..10).map(|i| alive_outcome(&format!("30.0.0.{i}"))).collect();
        pool.admit(&fresh);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_reconcile_evicts_and_records() {
        let dir = tempdir().unwrap();
        let mut pool = pool_with(dir.path(), &["1.1.1.1", "2.2.2.2", "3.3.3.3"], 10);
        let mut registry = DeadRegistry::empty(dir.path().join("dead.txt"), 30);

        let report = ValidationReport::from_outcomes(
            vec![dead_outcome("2.2.2.2"), alive_outcome("1.1.1.1")],
            0,
        );
        pool.reconcile(&report, &mut registry);

        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&proxy("2.2.2.2")));
        assert!(registry.contains(&proxy("2.2.2.2")));
        assert!(!registry.contains(&proxy("1.1.1.1")));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut pool = pool_with(dir.path(), &["1.1.1.1", "2.2.2.2"], 10);
        let mut registry = DeadRegistry::empty(dir.path().join("dead.txt"), 30);

        let report = ValidationReport::from_outcomes(vec![dead_outcome("1.1.1.1")], 0);
        pool.reconcile(&report, &mut registry);
        let after_first = pool.len();
        pool.reconcile(&report, &mut registry);

        assert_eq!(pool.len(), after_first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_all() {
        let dir = tempdir().unwrap();
        let mut pool = pool_with(dir.path(), &["1.1.1.1", "2.2.2.2", "3.3.3.3"], 10);

        pool.remove_all(&[proxy("2.2.2.2"), proxy("9.9.9.9")]);
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&proxy("2.2.2.2")));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let pool = pool_with(dir.path(), &["1.1.1.1", "2.2.2.2"], 10);
        pool.save().unwrap();

        let loaded = ProxyPool::load(dir.path().join("http.txt"), ProxyScheme::Http, 10).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&proxy("1.1.1.1")));
        assert!(loaded.contains(&proxy("2.2.2.2")));
    }

    #[test]
    fn test_load_dedupes_and_caps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("http.txt");
        fs::write(&path, "# header\n1.1.1.1:8080\n1.1.1.1:8080\n2.2.2.2:8080\n3.3.3.3:8080\n")
            .unwrap();

        let pool = ProxyPool::load(&path, ProxyScheme::Http, 2).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&proxy("1.1.1.1")));
        assert!(pool.contains(&proxy("2.2.2.2")));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let pool =
            ProxyPool::load(dir.path().join("nope.txt"), ProxyScheme::Socks5, 10).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.scheme(), ProxyScheme::Socks5);
    }

    #[test]
    fn test_no_duplicate_identities_after_any_operation() {
        let dir = tempdir().unwrap();
        let mut pool = pool_with(dir.path(), &["1.1.1.1", "2.2.2.2"], 10);
        pool.admit(&[alive_outcome("1.1.1.1"), alive_outcome("3.3.3.3")]);

        let mut seen = HashSet::new();
        for p in pool.iter() {
            assert!(seen.insert(p.clone()), "duplicate identity in pool: {p}");
        }
    }
}
