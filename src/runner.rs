//! Full validation pass: re-check existing pools, then grow them from sources
//!
//! Workers never mutate the pool or registry; each phase collects its batch
//! report first and merges afterwards, so the read-modify-write on shared
//! state is never interleaved with probing.

use crate::config::Config;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::proxy::headers::HeaderPool;
use crate::proxy::models::{Candidate, ProxyScheme};
use crate::proxy::pool::ProxyPool;
use crate::proxy::prober::{Prober, ProberConfig};
use crate::proxy::registry::DeadRegistry;
use crate::proxy::sources::{SourceFetcher, SourceList};
use crate::proxy::validator::Validator;
use futures::future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Counts from one full pass over one proxy type
#[derive(Debug)]
pub struct SchemeSummary {
    pub scheme: ProxyScheme,
    /// Pool size after the pass
    pub pool_size: usize,
    /// Existing members evicted as dead
    pub evicted: usize,
    /// Candidates fetched from sources (before deduplication)
    pub fetched: usize,
    /// New alive proxies admitted
    pub admitted: usize,
    /// Alive proxies discarded because the pool was full
    pub discarded: usize,
    /// Candidates skipped via the dead-proxy registry
    pub skipped: usize,
}

impl SchemeSummary {
    fn new(scheme: ProxyScheme) -> Self {
        Self {
            scheme,
            pool_size: 0,
            evicted: 0,
            fetched: 0,
            admitted: 0,
            discarded: 0,
            skipped: 0,
        }
    }
}

/// Summary of a complete run across both proxy types
#[derive(Debug, Default)]
pub struct RunSummary {
    pub schemes: Vec<SchemeSummary>,
    /// Dead-proxy registry size after the run
    pub dead_tracked: usize,
}

/// Drives the two-phase validation pass for every proxy type.
pub struct Runner {
    config: Config,
    validator: Validator,
    fetcher: SourceFetcher,
}

impl Runner {
    /// Build a runner from validated configuration. Opens the ledger; a
    /// ledger that cannot be created is fatal.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let headers = HeaderPool::from_file(&config.headers_file);
        let prober = Prober::new(
            ProberConfig::new()
                .with_timeout(Duration::from_secs(config.probe_timeout_secs))
                .with_test_url(config.test_url.clone()),
            headers,
        );
        let ledger = Arc::new(Ledger::open(config.ledger_file())?);
        let validator = Validator::new(prober, ledger, config.workers);
        let fetcher = SourceFetcher::new(Duration::from_secs(config.source_fetch_timeout_secs))?;

        Ok(Self {
            config,
            validator,
            fetcher,
        })
    }

    /// Execute the full pass: for each proxy type, re-validate the existing
    /// pool, then fetch, filter, and validate new candidates. The registry
    /// is persisted once at the end of the run.
    pub async fn run(&self, sources: &SourceList) -> Result<RunSummary> {
        let mut registry = DeadRegistry::load(
            self.config.dead_proxies_file(),
            self.config.dead_retention_days,
        )?;

        let mut summary = RunSummary::default();
        for scheme in ProxyScheme::ALL {
            info!(scheme = %scheme, "processing proxy type");
            let scheme_summary = self
                .process_scheme(scheme, sources, &mut registry)
                .await?;
            summary.schemes.push(scheme_summary);
        }

        registry.save()?;
        summary.dead_tracked = registry.len();
        info!(dead_tracked = summary.dead_tracked, "run complete");
        Ok(summary)
    }

    /// Phase 1 + phase 2 for one proxy type. Public so each phase remains
    /// independently exercisable through a scheme-sized entry point.
    pub async fn process_scheme(
        &self,
        scheme: ProxyScheme,
        sources: &SourceList,
        registry: &mut DeadRegistry,
    ) -> Result<SchemeSummary> {
        let mut pool = ProxyPool::load(
            self.config.pool_file(scheme),
            scheme,
            self.config.pool_capacity,
        )?;
        let mut summary = SchemeSummary::new(scheme);

        // Members already tracked as dead are dropped without a probe
        let known_dead: Vec<_> = pool
            .iter()
            .filter(|p| registry.contains(p))
            .cloned()
            .collect();
        if !known_dead.is_empty() {
            pool.remove_all(&known_dead);
            summary.evicted += known_dead.len();
            summary.skipped += known_dead.len();
            pool.save()?;
        }

        // Phase 1: re-validate the existing pool, evicting dead members
        if !pool.is_empty() {
            let existing: Vec<Candidate> = pool
                .iter()
                .cloned()
                .map(Candidate::existing)
                .collect();
            let before = pool.len();
            let report = self.validator.validate(existing, registry).await?;
            pool.reconcile(&report, registry);
            summary.evicted += before - pool.len();
            pool.save()?;
        }

        // Phase 2: fetch new candidates and grow the pool
        let candidates = self.fetch_candidates(scheme, sources, &pool).await;
        summary.fetched = candidates.len();

        if !candidates.is_empty() {
            let report = self.validator.validate(candidates, registry).await?;
            summary.skipped += report.skipped;

            // admit in fixed-size batches, saving after each, so a crash
            // loses at most one batch of admissions
            for batch in report.alive.chunks(self.config.save_batch) {
                let stats = pool.admit(batch);
                summary.admitted += stats.admitted;
                summary.discarded += stats.discarded;
                pool.save()?;
            }

            for outcome in &report.dead {
                registry.record(&outcome.proxy);
            }
        }

        pool.save()?;
        summary.pool_size = pool.len();
        info!(
            scheme = %scheme,
            pool_size = summary.pool_size,
            evicted = summary.evicted,
            admitted = summary.admitted,
            discarded = summary.discarded,
            skipped = summary.skipped,
            "proxy type complete"
        );
        Ok(summary)
    }

    /// Fetch all sources for a scheme concurrently and collect candidates
    /// not already in the pool. A failed source is skipped, never fatal.
    async fn fetch_candidates(
        &self,
        scheme: ProxyScheme,
        sources: &SourceList,
        pool: &ProxyPool,
    ) -> Vec<Candidate> {
        let scheme_sources = sources.for_scheme(scheme);
        if scheme_sources.is_empty() {
            return Vec::new();
        }

        let fetches = scheme_sources
            .into_iter()
            .map(|source| async move { (source.url.clone(), self.fetcher.fetch(source).await) });
        let results = future::join_all(fetches).await;

        let mut candidates = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (url, result) in results {
            match result {
                Ok(proxies) => {
                    info!(source = %url, count = proxies.len(), "fetched source");
                    for proxy in proxies {
                        if !pool.contains(&proxy) && seen.insert(proxy.clone()) {
                            candidates.push(Candidate::new(proxy, Some(url.clone())));
                        }
                    }
                }
                Err(e) => warn!(source = %url, error = %e, "source skipped for this pass"),
            }
        }
        candidates
    }
}
