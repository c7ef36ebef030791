//! Proxy validation engine
//!
//! This module provides functionality for:
//! - Probing proxies through themselves against a live target
//! - Tracking known-dead proxies with age-based expiry
//! - Validating candidate batches with bounded parallelism
//! - Maintaining capped, deduplicated, persisted pools per proxy type

pub mod headers;
pub mod models;
pub mod parser;
pub mod pool;
pub mod prober;
pub mod registry;
pub mod sources;
pub mod validator;

pub use headers::HeaderPool;
pub use models::{Candidate, ProbeOutcome, Proxy, ProxyScheme};
pub use parser::ProxyParser;
pub use pool::{AdmitStats, ProxyPool};
pub use prober::{Prober, ProberConfig};
pub use registry::DeadRegistry;
pub use sources::{Source, SourceFetcher, SourceList};
pub use validator::{ValidationReport, Validator};
