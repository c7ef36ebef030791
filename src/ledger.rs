//! Quality ledger: append-only CSV log of every validation attempt
//!
//! This is the system's only telemetry surface. Every executed probe appends
//! exactly one row, alive or dead; rows may interleave in any order under
//! concurrent workers but are never truncated.

use crate::error::{Error, Result};
use crate::proxy::models::ProbeOutcome;
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

/// Column header of the validation log
pub const LEDGER_HEADER: &str = "timestamp,proxy,proxy_type,source_url,status,response_time_ms,test_url";

/// Source label logged for pool re-validation outcomes
pub const EXISTING_SOURCE: &str = "existing";

/// Append-only validation log. Writes are serialized through a mutex so each
/// row lands complete.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    file: Mutex<File>,
}

impl Ledger {
    /// Open the ledger in append mode, creating it (and its parent
    /// directory) with a header row when absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let fresh = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if fresh {
            writeln!(file, "{LEDGER_HEADER}")?;
            file.flush()?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one outcome row and flush it to disk.
    pub fn append(&self, outcome: &ProbeOutcome, test_url: &str) -> Result<()> {
        let status = if outcome.alive { "alive" } else { "dead" };
        let latency = outcome
            .latency_ms
            .map(|ms| ms.to_string())
            .unwrap_or_default();
        let source = outcome.source.as_deref().unwrap_or(EXISTING_SOURCE);
        let test_url = if outcome.alive { test_url } else { "" };

        let row = format!(
            "{},{},{},{},{},{},{}\n",
            outcome.timestamp.to_rfc3339(),
            outcome.proxy.addr(),
            outcome.proxy.scheme,
            source,
            status,
            latency,
            test_url
        );

        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::Ledger("ledger writer lock poisoned".into()))?;
        file.write_all(row.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One parsed ledger row, as consumed by the analyzer.
#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub timestamp: DateTime<Utc>,
    pub proxy: String,
    pub proxy_type: crate::proxy::ProxyScheme,
    pub source_url: String,
    pub alive: bool,
    pub response_time_ms: Option<u64>,
}

impl LedgerRow {
    /// Parse a CSV row; `None` for the header or malformed lines.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.splitn(7, ',').collect();
        if fields.len() < 6 {
            return None;
        }

        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .ok()?
            .with_timezone(&Utc);
        let proxy_type = crate::proxy::ProxyScheme::from_str(fields[2]).ok()?;
        let alive = match fields[4] {
            "alive" => true,
            "dead" | "error" => false,
            _ => return None,
        };
        let response_time_ms = fields[5].parse().ok();

        Some(Self {
            timestamp,
            proxy: fields[1].to_string(),
            proxy_type,
            source_url: fields[3].to_string(),
            alive,
            response_time_ms,
        })
    }
}

/// Read all parseable rows from a ledger file.
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<LedgerRow>> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        Error::Ledger(format!(
            "cannot read validation log {}: {e}",
            path.as_ref().display()
        ))
    })?;
    Ok(content.lines().filter_map(LedgerRow::parse).collect())
}
