// src/error.rs
//! Typed errors at the component seams. Loader and application paths use `anyhow`.

use std::time::Duration;

/// Why a single source did not produce activities. Never escalated to the batch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("deadline exceeded after {}ms", .timeout.as_millis())]
    DeadlineExceeded { timeout: Duration },

    #[error("cancelled before completion")]
    Cancelled,

    #[error("connector panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::DeadlineExceeded { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("building http client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("task timeout must be greater than zero")]
    ZeroTimeout,
}
