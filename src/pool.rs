// src/pool.rs
//! Keyed pool of HTTP clients, one per distinct [`ClientConfig`].
//!
//! `acquire` is safe for any number of concurrent callers. The first caller to
//! publish a client for a fingerprint wins; a caller that built a candidate in
//! parallel drops it unused and returns the winner. Published handles are never
//! edited or replaced, only removed wholesale by [`ClientPool::close`].

use dashmap::DashMap;
use metrics::counter;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::config::HttpSettings;
use crate::error::PoolError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub skip_tls_verify: bool,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            skip_tls_verify: false,
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&HttpSettings> for ClientConfig {
    fn from(s: &HttpSettings) -> Self {
        Self {
            timeout: Duration::from_secs(s.timeout_secs),
            skip_tls_verify: s.skip_tls_verify,
            max_idle_per_host: s.max_idle_per_host,
            idle_timeout: Duration::from_secs(s.idle_timeout_secs),
        }
    }
}

impl ClientConfig {
    /// Canonical key over all four fields.
    pub fn fingerprint(&self) -> ClientFingerprint {
        ClientFingerprint(format!(
            "timeout_ms={};skip_tls_verify={};max_idle_per_host={};idle_timeout_ms={}",
            self.timeout.as_millis(),
            self.skip_tls_verify,
            self.max_idle_per_host,
            self.idle_timeout.as_millis()
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientFingerprint(String);

impl ClientFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable digest for log lines.
    pub fn short_id(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.0.as_bytes());
        let mut out = String::with_capacity(8);
        for b in digest.iter().take(4) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

impl fmt::Display for ClientFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct PooledClient {
    client: reqwest::Client,
    config: ClientConfig,
    fingerprint: ClientFingerprint,
}

impl PooledClient {
    fn build(config: ClientConfig, fingerprint: ClientFingerprint) -> Result<Self, PoolError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            fingerprint,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &ClientFingerprint {
        &self.fingerprint
    }
}

#[derive(Debug, Default)]
pub struct ClientPool {
    clients: DashMap<ClientFingerprint, Arc<PooledClient>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pooled client for `config`, creating it on first use.
    /// A build failure affects this call only; the pool is unchanged.
    pub fn acquire(&self, config: &ClientConfig) -> Result<Arc<PooledClient>, PoolError> {
        let fp = config.fingerprint();
        if let Some(existing) = self.clients.get(&fp) {
            return Ok(Arc::clone(existing.value()));
        }

        // Build outside the shard lock; only one candidate per key gets published.
        let candidate = Arc::new(PooledClient::build(config.clone(), fp.clone())?);
        let winner = {
            let entry = self
                .clients
                .entry(fp)
                .or_insert_with(|| Arc::clone(&candidate));
            Arc::clone(entry.value())
        };

        if Arc::ptr_eq(&winner, &candidate) {
            counter!("client_pool_clients_created_total").increment(1);
            debug!(client = %winner.fingerprint.short_id(), pooled = self.clients.len(), "http client created");
        } else {
            counter!("client_pool_races_lost_total").increment(1);
            trace!(client = %winner.fingerprint.short_id(), "lost first-create race; discarding candidate");
        }
        Ok(winner)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Drop every pooled handle and empty the pool.
    ///
    /// reqwest frees a client's idle connections when its last clone is dropped,
    /// so connections owned by handles callers still hold (including in-flight
    /// requests) stay alive until those handles go away. Nothing is cancelled.
    pub fn close(&self) {
        let released = self.clients.len();
        self.clients.clear();
        info!(released, "client pool closed");
    }
}
