//! Proxy Warden - proxy pool validator
//!
//! Validates HTTP and SOCKS5 proxies fetched from public source lists,
//! maintains capped pools of confirmed-alive proxies, skips known-dead
//! proxies via a time-bounded registry, and logs every validation attempt
//! for offline source-quality analysis.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod ledger;
pub mod proxy;
pub mod runner;

pub use analyzer::{Analyzer, Severity, SourceQuality};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use runner::{RunSummary, Runner};

/// Initialize the logger with default settings
pub fn init_logger() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();
}
