// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod activity;
pub mod config;
pub mod connector;
pub mod error;
pub mod executor;
pub mod pool;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::activity::{sort_chronologically, Activity};
pub use crate::config::{AppConfig, ConfigCache, ConfigLoader, TomlFileLoader};
pub use crate::connector::{build_connectors, Connector, ConnectorSet, FetchContext};
pub use crate::error::{ExecutorError, FetchError, PoolError};
pub use crate::executor::{
    combine_successful, ConnectorResult, ExecutionStats, ParallelExecutor, TracingWarnings,
    WarningSink,
};
pub use crate::pool::{ClientConfig, ClientPool, PooledClient};
