// src/executor/stats.rs
//! Aggregate view over one batch of [`ConnectorResult`]s.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::ConnectorResult;

/// Batch statistics. `successful_fetches + failed_fetches == total_connectors`.
///
/// Per-source durations are each task's own elapsed time; tasks overlap, so they
/// do not sum to `total_duration`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub total_connectors: usize,
    pub successful_fetches: usize,
    pub failed_fetches: usize,
    pub total_activities: usize,
    pub total_duration: Duration,
    pub connector_durations: BTreeMap<String, Duration>,
    /// Only failed sources appear here.
    pub errors: BTreeMap<String, String>,
}

impl ExecutionStats {
    pub fn from_results(results: &[ConnectorResult], total_duration: Duration) -> Self {
        let mut stats = ExecutionStats {
            total_connectors: results.len(),
            total_duration,
            ..Default::default()
        };
        for r in results {
            stats.connector_durations.insert(r.name.clone(), r.duration);
            match &r.error {
                None => {
                    stats.successful_fetches += 1;
                    stats.total_activities += r.activities.len();
                }
                Some(e) => {
                    stats.failed_fetches += 1;
                    stats.errors.insert(r.name.clone(), format!("{e:#}"));
                }
            }
        }
        stats
    }

    pub fn has_errors(&self) -> bool {
        self.failed_fetches > 0
    }

    /// Linear scan in name order; on a tie the alphabetically first source wins.
    pub fn slowest_source(&self) -> Option<(&str, Duration)> {
        let mut best: Option<(&str, Duration)> = None;
        for (name, d) in &self.connector_durations {
            if best.map_or(true, |(_, b)| *d > b) {
                best = Some((name.as_str(), *d));
            }
        }
        best
    }

    /// Linear scan in name order; on a tie the alphabetically first source wins.
    pub fn fastest_source(&self) -> Option<(&str, Duration)> {
        let mut best: Option<(&str, Duration)> = None;
        for (name, d) in &self.connector_durations {
            if best.map_or(true, |(_, b)| *d < b) {
                best = Some((name.as_str(), *d));
            }
        }
        best
    }

    /// Truncating integer percentage; 0 for an empty batch.
    pub fn success_rate_percent(&self) -> u32 {
        if self.total_connectors == 0 {
            return 0;
        }
        (self.successful_fetches * 100 / self.total_connectors) as u32
    }
}

impl fmt::Display for ExecutionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sources: {} ok, {} failed ({}%), {} activities in {}ms",
            self.total_connectors,
            self.successful_fetches,
            self.failed_fetches,
            self.success_rate_percent(),
            self.total_activities,
            self.total_duration.as_millis()
        )
    }
}
