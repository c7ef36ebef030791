//! Offline source-quality analysis over the validation ledger

use crate::error::Result;
use crate::ledger::{self, LedgerRow, EXISTING_SOURCE};
use crate::proxy::ProxyScheme;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Minimum tested rows before a source appears in the worst-sources view
const MIN_TESTED_FOR_RANKING: usize = 10;

/// Sources listed per proxy type in the worst-sources view
const MAX_WORST_SOURCES: usize = 5;

/// Alive percentage below which a source is flagged critical
const CRITICAL_THRESHOLD: f64 = 10.0;

/// Alive percentage below which a source is flagged as a warning
const WARNING_THRESHOLD: f64 = 20.0;

/// Severity flag for a poorly performing source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Below 10% alive; the source is effectively useless
    Critical,
    /// Below 20% alive
    Warning,
}

/// Aggregated quality metrics for one source within the analysis window.
/// Derived from the ledger; never persisted as primary state.
#[derive(Debug, Clone)]
pub struct SourceQuality {
    pub source_url: String,
    pub total_tested: usize,
    pub alive_count: usize,
    pub dead_count: usize,
    /// Alive percentage; doubles as the quality score
    pub alive_percent: f64,
    /// Mean latency among alive rows, 0 when none carried a latency
    pub avg_response_time_ms: f64,
    /// Proxy types this source provided within the window
    pub schemes: BTreeSet<ProxyScheme>,
}

impl SourceQuality {
    /// Quality score used for ranking (alive percentage).
    pub fn quality_score(&self) -> f64 {
        self.alive_percent
    }

    /// Severity flag, if the source falls below a threshold.
    pub fn severity(&self) -> Option<Severity> {
        if self.alive_percent < CRITICAL_THRESHOLD {
            Some(Severity::Critical)
        } else if self.alive_percent < WARNING_THRESHOLD {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

/// Offline analyzer over the validation ledger
pub struct Analyzer {
    log_path: PathBuf,
}

impl Analyzer {
    pub fn new<P: AsRef<Path>>(log_path: P) -> Self {
        Self {
            log_path: log_path.as_ref().to_path_buf(),
        }
    }

    /// Per-source quality within the last `days`, ranked by descending
    /// quality score. Re-validation rows (source `existing`) are excluded.
    pub fn analyze(&self, days: i64) -> Result<Vec<SourceQuality>> {
        let rows = self.rows_within(days)?;
        let mut stats = Self::aggregate(rows.iter().collect());

        stats.sort_by(|a, b| {
            b.quality_score()
                .partial_cmp(&a.quality_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_url.cmp(&b.source_url))
        });
        Ok(stats)
    }

    /// The five worst sources per proxy type within the last `days`, ranked
    /// by ascending quality score. Sources with fewer than 10 tested rows
    /// are excluded as statistically meaningless.
    pub fn worst_by_scheme(
        &self,
        days: i64,
    ) -> Result<BTreeMap<ProxyScheme, Vec<SourceQuality>>> {
        let rows = self.rows_within(days)?;
        let mut by_scheme = BTreeMap::new();

        for scheme in ProxyScheme::ALL {
            let scheme_rows: Vec<&LedgerRow> =
                rows.iter().filter(|r| r.proxy_type == scheme).collect();
            let mut stats: Vec<SourceQuality> = Self::aggregate(scheme_rows)
                .into_iter()
                .filter(|s| s.total_tested >= MIN_TESTED_FOR_RANKING)
                .collect();

            stats.sort_by(|a, b| {
                a.quality_score()
                    .partial_cmp(&b.quality_score())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.source_url.cmp(&b.source_url))
            });
            stats.truncate(MAX_WORST_SOURCES);
            by_scheme.insert(scheme, stats);
        }

        Ok(by_scheme)
    }

    /// Export the ranked quality report as CSV. Written only on request.
    pub fn export<P: AsRef<Path>>(&self, output: P, days: i64) -> Result<()> {
        let stats = self.analyze(days)?;
        let analysis_date = Utc::now().to_rfc3339();

        let mut content = String::from(
            "source_url,total_tested,alive_count,dead_count,alive_percent,avg_response_time_ms,proxy_types,quality_score,analysis_date\n",
        );
        for s in &stats {
            let types = s
                .schemes
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            content.push_str(&format!(
                "{},{},{},{},{:.2},{:.2},{},{:.2},{}\n",
                s.source_url,
                s.total_tested,
                s.alive_count,
                s.dead_count,
                s.alive_percent,
                s.avg_response_time_ms,
                types,
                s.quality_score(),
                analysis_date
            ));
        }

        if let Some(parent) = output.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output.as_ref(), content)?;
        info!(path = %output.as_ref().display(), sources = stats.len(), "exported quality report");
        Ok(())
    }

    fn rows_within(&self, days: i64) -> Result<Vec<LedgerRow>> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows = ledger::read_rows(&self.log_path)?;
        Ok(rows
            .into_iter()
            .filter(|r| r.timestamp >= cutoff)
            .collect())
    }

    fn aggregate(rows: Vec<&LedgerRow>) -> Vec<SourceQuality> {
        let mut grouped: BTreeMap<&str, Vec<&LedgerRow>> = BTreeMap::new();
        for row in rows {
            if row.source_url == EXISTING_SOURCE {
                continue;
            }
            grouped.entry(&row.source_url).or_default().push(row);
        }

        grouped
            .into_iter()
            .map(|(source_url, rows)| {
                let total_tested = rows.len();
                let alive_count = rows.iter().filter(|r| r.alive).count();
                let dead_count = total_tested - alive_count;
                let alive_percent = if total_tested > 0 {
                    alive_count as f64 / total_tested as f64 * 100.0
                } else {
                    0.0
                };

                let latencies: Vec<u64> = rows
                    .iter()
                    .filter(|r| r.alive)
                    .filter_map(|r| r.response_time_ms)
                    .collect();
                let avg_response_time_ms = if latencies.is_empty() {
                    0.0
                } else {
                    latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
                };

                let schemes = rows.iter().map(|r| r.proxy_type).collect();

                SourceQuality {
                    source_url: source_url.to_string(),
                    total_tested,
                    alive_count,
                    dead_count,
                    alive_percent,
                    avg_response_time_ms,
                    schemes,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::proxy::{ProbeOutcome, Proxy};
    use tempfile::tempdir;

    fn write_rows(path: &Path, source: &str, alive: usize, dead: usize, scheme: ProxyScheme) {
        let ledger = Ledger::open(path).unwrap();
        for i in 0..alive {
            let outcome = ProbeOutcome::alive(
                Proxy::new(format!("10.0.0.{}", i % 250), 8080, scheme),
                100 + i as u64,
                Some(source.to_string()),
            );
            ledger.append(&outcome, "http://test").unwrap();
        }
        for i in 0..dead {
            let outcome = ProbeOutcome::dead(
                Proxy::new(format!("10.1.0.{}", i % 250), 8080, scheme),
                Some(source.to_string()),
            );
            ledger.append(&outcome, "http://test").unwrap();
        }
    }

    #[test]
    fn test_alive_percent_and_ranking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        write_rows(&path, "http://poor.example", 20, 80, ProxyScheme::Http);
        write_rows(&path, "http://good.example", 80, 20, ProxyScheme::Http);

        let stats = Analyzer::new(&path).analyze(7).unwrap();
        assert_eq!(stats.len(), 2);

        // descending quality score: good first
        assert_eq!(stats[0].source_url, "http://good.example");
        assert_eq!(stats[0].total_tested, 100);
        assert!((stats[0].alive_percent - 80.0).abs() < f64::EPSILON);

        assert_eq!(stats[1].source_url, "http://poor.example");
        assert!((stats[1].alive_percent - 20.0).abs() < f64::EPSILON);
        assert_eq!(stats[1].alive_count, 20);
        assert_eq!(stats[1].dead_count, 80);
    }

    #[test]
    fn test_mean_latency_over_alive_rows_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let ledger = Ledger::open(&path).unwrap();
        let source = Some("http://src.example".to_string());
        let p = |h: &str| Proxy::new(h, 8080, ProxyScheme::Http);

        ledger
            .append(&ProbeOutcome::alive(p("1.1.1.1"), 100, source.clone()), "t")
            .unwrap();
        ledger
            .append(&ProbeOutcome::alive(p("2.2.2.2"), 300, source.clone()), "t")
            .unwrap();
        ledger
            .append(&ProbeOutcome::dead(p("3.3.3.3"), source), "t")
            .unwrap();

        let stats = Analyzer::new(&path).analyze(7).unwrap();
        assert!((stats[0].avg_response_time_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_existing_rows_are_excluded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let ledger = Ledger::open(&path).unwrap();
        // source None is logged as `existing`
        ledger
            .append(
                &ProbeOutcome::alive(Proxy::new("1.1.1.1", 80, ProxyScheme::Http), 50, None),
                "t",
            )
            .unwrap();

        let stats = Analyzer::new(&path).analyze(7).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn test_worst_by_scheme_thresholds_and_minimum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        write_rows(&path, "http://critical.example", 1, 19, ProxyScheme::Http);
        write_rows(&path, "http://warning.example", 3, 17, ProxyScheme::Http);
        write_rows(&path, "http://fine.example", 15, 5, ProxyScheme::Http);
        // below the 10-row minimum, must not appear
        write_rows(&path, "http://tiny.example", 0, 5, ProxyScheme::Http);
        write_rows(&path, "http://socks.example", 2, 18, ProxyScheme::Socks5);

        let worst = Analyzer::new(&path).worst_by_scheme(7).unwrap();

        let http = &worst[&ProxyScheme::Http];
        assert_eq!(http.len(), 3);
        // ascending: worst first
        assert_eq!(http[0].source_url, "http://critical.example");
        assert_eq!(http[0].severity(), Some(Severity::Critical));
        assert_eq!(http[1].source_url, "http://warning.example");
        assert_eq!(http[1].severity(), Some(Severity::Warning));
        assert_eq!(http[2].severity(), None);
        assert!(!http.iter().any(|s| s.source_url == "http://tiny.example"));

        let socks = &worst[&ProxyScheme::Socks5];
        assert_eq!(socks.len(), 1);
        assert_eq!(socks[0].source_url, "http://socks.example");
    }

    #[test]
    fn test_worst_by_scheme_lists_at_most_five_sources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        // seven qualifying sources, progressively less bad
        for i in 0..7 {
            let source = format!("http://src{i}.example");
            write_rows(&path, &source, i, 20 - i, ProxyScheme::Http);
        }

        let worst = Analyzer::new(&path).worst_by_scheme(7).unwrap();
        let http = &worst[&ProxyScheme::Http];
        assert_eq!(http.len(), 5);
        // worst first, best two cut off
        assert_eq!(http[0].source_url, "http://src0.example");
        assert!(!http.iter().any(|s| s.source_url == "http://src6.example"));
    }

    #[test]
    fn test_export_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        write_rows(&path, "http://src.example", 5, 5, ProxyScheme::Http);

        let out = dir.path().join("report.csv");
        Analyzer::new(&path).export(&out, 7).unwrap();

        let content = fs::read_to_string(&out).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "source_url,total_tested,alive_count,dead_count,alive_percent,avg_response_time_ms,proxy_types,quality_score,analysis_date"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("http://src.example,10,5,5,50.00,"));
    }

    #[test]
    fn test_missing_ledger_is_an_error() {
        let analyzer = Analyzer::new("/nonexistent/log.csv");
        assert!(analyzer.analyze(7).is_err());
    }
}
