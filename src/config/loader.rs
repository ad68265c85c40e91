// src/config/loader.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::model::AppConfig;

pub const ENV_CONFIG_PATH: &str = "AGGREGATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/aggregator.toml";

/// The backing store behind a [`ConfigCache`](super::cache::ConfigCache).
pub trait ConfigLoader: Send + Sync {
    type Config: Send + Sync;

    fn path(&self) -> &Path;

    /// Perform the real read and parse.
    fn load(&self) -> Result<Self::Config>;

    /// Modification time of the backing file.
    fn modified(&self) -> Result<SystemTime> {
        let path = self.path();
        fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("stat {}", path.display()))
    }
}

/// Loads [`AppConfig`] from a TOML file.
#[derive(Debug, Clone)]
pub struct TomlFileLoader {
    path: PathBuf,
}

impl TomlFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 1) $AGGREGATOR_CONFIG_PATH (must exist)
    /// 2) config/aggregator.toml
    pub fn from_env() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            return Ok(Self::new(pb));
        }
        Ok(Self::new(DEFAULT_CONFIG_PATH))
    }
}

impl ConfigLoader for TomlFileLoader {
    type Config = AppConfig;

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<AppConfig> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading config from {}", self.path.display()))?;
        AppConfig::from_toml_str(&content)
            .with_context(|| format!("parsing config {}", self.path.display()))
    }
}
