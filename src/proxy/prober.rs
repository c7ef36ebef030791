//! Target prober: a single validation request through one proxy

use crate::proxy::headers::HeaderPool;
use crate::proxy::models::{Candidate, ProbeOutcome, Proxy, ProxyScheme};
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default timeout for a single probe in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Default URL to probe through each proxy
const DEFAULT_TEST_URL: &str = "http://httpbin.org/ip";

/// Configuration for the target prober
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Timeout covering connect, handshake, and the full request
    pub timeout: Duration,
    /// URL requested through the proxy
    pub test_url: String,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            test_url: DEFAULT_TEST_URL.to_string(),
        }
    }
}

impl ProberConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }
}

/// Issues one validation request through a given proxy and classifies the
/// result. Holds no shared state; safe to call concurrently.
#[derive(Clone)]
pub struct Prober {
    config: ProberConfig,
    headers: HeaderPool,
}

impl Prober {
    pub fn new(config: ProberConfig, headers: HeaderPool) -> Self {
        Self { config, headers }
    }

    /// Probe a single candidate.
    ///
    /// Never fails: any timeout, connection refusal, protocol error, or
    /// non-success response becomes a dead outcome. The call returns within
    /// the configured timeout plus small overhead.
    pub async fn probe(&self, candidate: &Candidate) -> ProbeOutcome {
        let proxy = &candidate.proxy;
        let start = Instant::now();

        let client = match self.build_client(proxy) {
            Ok(client) => client,
            Err(e) => {
                debug!(proxy = %proxy, error = %e, "client build failed");
                return ProbeOutcome::dead(proxy.clone(), candidate.source.clone());
            }
        };

        let request = client
            .get(&self.config.test_url)
            .headers(self.headers.random())
            .send();

        match tokio::time::timeout(self.config.timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => {
                let elapsed = start.elapsed().as_millis() as u64;
                ProbeOutcome::alive(proxy.clone(), elapsed, candidate.source.clone())
            }
            Ok(Ok(response)) => {
                debug!(proxy = %proxy, status = %response.status(), "non-success response");
                ProbeOutcome::dead(proxy.clone(), candidate.source.clone())
            }
            Ok(Err(e)) => {
                debug!(proxy = %proxy, error = %e, "probe request failed");
                ProbeOutcome::dead(proxy.clone(), candidate.source.clone())
            }
            Err(_) => {
                debug!(proxy = %proxy, timeout = ?self.config.timeout, "probe timed out");
                ProbeOutcome::dead(proxy.clone(), candidate.source.clone())
            }
        }
    }

    /// URL probed through each proxy; recorded in the ledger.
    pub fn test_url(&self) -> &str {
        &self.config.test_url
    }

    /// Build a reqwest client routed through the proxy. For SOCKS5 the
    /// handshake happens inside reqwest's socks connector.
    fn build_client(&self, proxy: &Proxy) -> Result<Client, reqwest::Error> {
        let reqwest_proxy = match proxy.scheme {
            ProxyScheme::Http => ReqwestProxy::http(proxy.url())?,
            ProxyScheme::Socks5 => ReqwestProxy::all(proxy.url())?,
        };

        let client = Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }
}
