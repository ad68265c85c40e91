// src/executor/combine.rs
use super::ConnectorResult;
use crate::activity::Activity;
use crate::error::FetchError;

/// Where per-source failure warnings go.
pub trait WarningSink: Send + Sync {
    fn warn(&self, source: &str, error: &FetchError);
}

/// Default sink: one `tracing` warning per failed source.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWarnings;

impl WarningSink for TracingWarnings {
    fn warn(&self, source: &str, error: &FetchError) {
        tracing::warn!(source, error = %format!("{error:#}"), "source fetch failed");
    }
}

/// Concatenate activities of every successful result. Failures are reported to
/// `sink` and skipped; the call itself never fails.
pub fn combine_successful(results: &[ConnectorResult], sink: &dyn WarningSink) -> Vec<Activity> {
    let mut out = Vec::with_capacity(results.iter().map(|r| r.activities.len()).sum());
    for r in results {
        match &r.error {
            None => out.extend(r.activities.iter().cloned()),
            Some(e) => sink.warn(&r.name, e),
        }
    }
    out
}
