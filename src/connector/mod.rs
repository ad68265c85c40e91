// src/connector/mod.rs
pub mod file;
pub mod http;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::activity::Activity;
use crate::config::{AppConfig, SourceKind};
use crate::pool::{ClientConfig, ClientPool};

/// Deadline and cancellation scope handed to a single fetch.
///
/// The executor enforces the deadline from outside as well; connectors use this
/// to bound their own I/O and to stop early once cancelled.
#[derive(Debug, Clone)]
pub struct FetchContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl FetchContext {
    pub fn new(deadline: Instant, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// Standalone context with a fresh token, for calling a connector directly.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// One data source: given a date, return that day's activities or fail.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn fetch(&self, ctx: &FetchContext, date: NaiveDate) -> Result<Vec<Activity>>;

    /// Short label for logs, e.g. "http", "file".
    fn kind(&self) -> &'static str;
}

pub type DynConnector = Arc<dyn Connector>;

/// Source name -> connector. Map keys make task names unique.
pub type ConnectorSet = HashMap<String, DynConnector>;

/// Build connectors for every enabled source. HTTP sources share pooled clients.
pub fn build_connectors(cfg: &AppConfig, pool: &ClientPool) -> Result<ConnectorSet> {
    let client_cfg = ClientConfig::from(&cfg.http);
    let mut out: ConnectorSet = HashMap::new();
    for src in cfg.enabled_sources() {
        let connector: DynConnector = match &src.kind {
            SourceKind::Http { url } => {
                let client = pool
                    .acquire(&client_cfg)
                    .with_context(|| format!("http client for source {}", src.name))?;
                Arc::new(http::HttpJsonConnector::new(&src.name, url, client))
            }
            SourceKind::File { path } => Arc::new(file::FileConnector::new(&src.name, path)),
        };
        tracing::debug!(source = %src.name, kind = connector.kind(), "connector ready");
        out.insert(src.name.clone(), connector);
    }
    Ok(out)
}
