// src/connector/http.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use super::{Connector, FetchContext};
use crate::activity::Activity;
use crate::pool::PooledClient;

/// JSON feed: `GET <url>?date=YYYY-MM-DD` answering with an array of activities.
pub struct HttpJsonConnector {
    name: String,
    url: String,
    client: Arc<PooledClient>,
}

impl HttpJsonConnector {
    pub fn new(name: &str, url: &str, client: Arc<PooledClient>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            client,
        }
    }

    async fn request(&self, ctx: &FetchContext, date: NaiveDate) -> Result<Vec<Activity>> {
        let resp = self
            .client
            .http()
            .get(&self.url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            // Tighter of the executor deadline and the pooled client's own limit.
            .timeout(ctx.remaining().min(self.client.config().timeout))
            .send()
            .await
            .with_context(|| format!("{} http get()", self.name))?;

        let resp = resp
            .error_for_status()
            .with_context(|| format!("{} http status", self.name))?;

        resp.json::<Vec<Activity>>()
            .await
            .with_context(|| format!("{} decoding json feed", self.name))
    }
}

#[async_trait]
impl Connector for HttpJsonConnector {
    async fn fetch(&self, ctx: &FetchContext, date: NaiveDate) -> Result<Vec<Activity>> {
        let mut items = tokio::select! {
            r = self.request(ctx, date) => r?,
            _ = ctx.cancelled() => bail!("{} fetch cancelled", self.name),
        };
        for a in &mut items {
            a.source = self.name.clone();
        }
        tracing::debug!(source = %self.name, count = items.len(), "http feed fetched");
        Ok(items)
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}
