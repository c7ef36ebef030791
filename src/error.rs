//! Error types for proxy-warden operations

use std::io;

/// Error type for proxy-warden operations.
///
/// Probe failures are deliberately absent: a proxy that refuses, times out,
/// or misbehaves is a dead outcome, not an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pool, registry, or ledger file could not be read or written.
    /// Fatal for the run; losing validated state silently would corrupt
    /// the next run's invariants.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Invalid configuration, rejected before any probing starts
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A candidate source could not be fetched or parsed; the source is
    /// skipped for the pass
    #[error("source fetch failed: {0}")]
    SourceFetch(String),
    /// Validation log file is malformed
    #[error("ledger error: {0}")]
    Ledger(String),
    /// The validator was handed an empty candidate set
    #[error("no candidates to validate")]
    EmptyBatch,
}

/// Result type for proxy-warden operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::SourceFetch(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Configuration(err.to_string())
    }
}
