// src/connector/file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use super::{Connector, FetchContext};
use crate::activity::Activity;

/// Activities from a JSON array on disk, keeping only those on the requested day.
pub struct FileConnector {
    name: String,
    path: PathBuf,
}

impl FileConnector {
    pub fn new(name: &str, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Connector for FileConnector {
    async fn fetch(&self, _ctx: &FetchContext, date: NaiveDate) -> Result<Vec<Activity>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let all: Vec<Activity> = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        Ok(all
            .into_iter()
            .filter(|a| a.is_on(date))
            .map(|mut a| {
                a.source = self.name.clone();
                a
            })
            .collect())
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}
