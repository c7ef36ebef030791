//! Concurrent validator: bounded-parallel probing of a candidate batch

use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::proxy::models::{Candidate, ProbeOutcome};
use crate::proxy::prober::Prober;
use crate::proxy::registry::DeadRegistry;
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Alive/dead partition of one validation batch.
///
/// Partitions are sorted by proxy identity, so the report is deterministic
/// for a given set of probe outcomes regardless of worker scheduling.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub alive: Vec<ProbeOutcome>,
    pub dead: Vec<ProbeOutcome>,
    /// Candidates skipped because the dead-proxy registry already held them
    pub skipped: usize,
}

impl ValidationReport {
    /// Partition collected outcomes into a deterministic report.
    pub fn from_outcomes(outcomes: Vec<ProbeOutcome>, skipped: usize) -> Self {
        let (mut alive, mut dead): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition(|o| o.alive);
        alive.sort_by(|a, b| a.proxy.cmp(&b.proxy));
        dead.sort_by(|a, b| a.proxy.cmp(&b.proxy));
        Self {
            alive,
            dead,
            skipped,
        }
    }

    /// Number of probes actually executed.
    pub fn probed(&self) -> usize {
        self.alive.len() + self.dead.len()
    }
}

/// Orchestrates probing across a candidate batch with bounded parallelism.
///
/// Workers only probe and append ledger rows; pool and registry mutations
/// are left to the caller once the batch completes.
pub struct Validator {
    prober: Prober,
    ledger: Arc<Ledger>,
    workers: usize,
}

impl Validator {
    pub fn new(prober: Prober, ledger: Arc<Ledger>, workers: usize) -> Self {
        Self {
            prober,
            ledger,
            workers: workers.max(1),
        }
    }

    /// Validate a candidate batch.
    ///
    /// Candidates present in the registry are skipped outright: no probe,
    /// no ledger row. Every executed probe appends exactly one ledger row
    /// before this call returns. A single probe failure never aborts the
    /// batch; the only batch-level failure is an empty candidate set.
    pub async fn validate(
        &self,
        candidates: Vec<Candidate>,
        registry: &DeadRegistry,
    ) -> Result<ValidationReport> {
        if candidates.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let total = candidates.len();
        let mut to_probe: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !registry.contains(&c.proxy))
            .collect();
        let skipped = total - to_probe.len();
        if skipped > 0 {
            debug!(skipped, "skipped known-dead candidates");
        }

        // Scramble probing order to spread load across sources
        to_probe.shuffle(&mut rand::thread_rng());

        info!(
            probing = to_probe.len(),
            skipped,
            workers = self.workers,
            "validating candidate batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let results: Vec<Result<ProbeOutcome>> = stream::iter(to_probe)
            .map(|candidate| {
                let sem = Arc::clone(&semaphore);
                let prober = self.prober.clone();
                let ledger = Arc::clone(&self.ledger);
                async move {
                    // Acquire only fails if the semaphore is closed, which
                    // cannot happen while we hold the Arc.
                    let _permit = sem
                        .acquire()
                        .await
                        .expect("semaphore closed unexpectedly");
                    let outcome = prober.probe(&candidate).await;
                    ledger.append(&outcome, prober.test_url())?;
                    Ok(outcome)
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut outcomes = Vec::with_capacity(results.len());
        for result in results {
            outcomes.push(result?);
        }

        let report = ValidationReport::from_outcomes(outcomes, skipped);
        info!(
            alive = report.alive.len(),
            dead = report.dead.len(),
            skipped = report.skipped,
            "batch complete"
        );
        Ok(report)
    }
}
