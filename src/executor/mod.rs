// src/executor/mod.rs
//! Fan-out/fan-in over a set of connectors.
//!
//! Every task runs in its own tokio task, admitted by a per-batch semaphore of
//! `max_concurrency` permits. Admitted tasks get an independent deadline of
//! `task_timeout` and a child of the caller's cancellation token, so a timeout or
//! failure in one source never touches its siblings. Results are funneled
//! through a channel sized to the batch; completion order is not preserved.

pub mod combine;
pub mod stats;

use chrono::NaiveDate;
use metrics::{counter, histogram};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activity::Activity;
use crate::config::ExecutorSettings;
use crate::connector::{ConnectorSet, DynConnector, FetchContext};
use crate::error::{ExecutorError, FetchError};

pub use combine::{combine_successful, TracingWarnings, WarningSink};
pub use stats::ExecutionStats;

/// Outcome of one source. Exactly one per task, whatever happened.
#[derive(Debug)]
pub struct ConnectorResult {
    pub name: String,
    pub activities: Vec<Activity>,
    pub error: Option<FetchError>,
    pub duration: Duration,
}

impl ConnectorResult {
    fn failed(name: String, error: FetchError, duration: Duration) -> Self {
        Self {
            name,
            activities: Vec::new(),
            error: Some(error),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Notified after each result lands, with `(completed, total)`.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

/// Truncating integer percentage; 0 when `total` is 0.
pub fn percent_complete(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed.min(total) * 100 / total) as u32
}

/// A connector paired with its source name for one batch.
struct ConnectorTask {
    name: String,
    connector: DynConnector,
}

impl ConnectorTask {
    async fn run(
        self,
        gate: Arc<Semaphore>,
        token: CancellationToken,
        timeout: Duration,
        date: NaiveDate,
    ) -> ConnectorResult {
        let _permit = tokio::select! {
            p = gate.acquire_owned() => match p {
                Ok(p) => p,
                Err(_) => return ConnectorResult::failed(self.name, FetchError::Cancelled, Duration::ZERO),
            },
            _ = token.cancelled() => {
                return ConnectorResult::failed(self.name, FetchError::Cancelled, Duration::ZERO);
            }
        };

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let ctx = FetchContext::new(deadline, token.clone());
        let connector = Arc::clone(&self.connector);

        // Separate task so a panicking connector is caught as a JoinError.
        let fetch = tokio::spawn(async move { connector.fetch(&ctx, date).await });
        let abort = fetch.abort_handle();

        let outcome = tokio::select! {
            joined = fetch => match joined {
                Ok(Ok(items)) => Ok(items),
                Ok(Err(e)) => Err(FetchError::Source(e)),
                Err(je) => Err(FetchError::Panicked(je.to_string())),
            },
            _ = tokio::time::sleep_until(deadline) => {
                token.cancel();
                abort.abort();
                Err(FetchError::DeadlineExceeded { timeout })
            }
            _ = token.cancelled() => {
                abort.abort();
                Err(FetchError::Cancelled)
            }
        };
        let duration = started.elapsed();

        counter!("fanout_tasks_total").increment(1);
        histogram!("fanout_task_duration_ms").record(duration.as_secs_f64() * 1_000.0);

        match outcome {
            Ok(activities) => {
                debug!(
                    source = %self.name,
                    kind = self.connector.kind(),
                    activities = activities.len(),
                    ms = duration.as_millis() as u64,
                    "source fetched"
                );
                ConnectorResult {
                    name: self.name,
                    activities,
                    error: None,
                    duration,
                }
            }
            Err(e) => {
                counter!("fanout_task_failures_total").increment(1);
                if e.is_timeout() {
                    counter!("fanout_task_timeouts_total").increment(1);
                }
                debug!(source = %self.name, error = %e, ms = duration.as_millis() as u64, "source failed");
                ConnectorResult::failed(self.name, e, duration)
            }
        }
    }
}

/// Bounded-concurrency batch runner. Holds no shared state between batches.
pub struct ParallelExecutor {
    max_concurrency: usize,
    task_timeout: Duration,
    progress: Option<Arc<dyn ProgressObserver>>,
}

impl ParallelExecutor {
    pub fn new(max_concurrency: usize, task_timeout: Duration) -> Result<Self, ExecutorError> {
        if max_concurrency == 0 {
            return Err(ExecutorError::ZeroConcurrency);
        }
        if task_timeout.is_zero() {
            return Err(ExecutorError::ZeroTimeout);
        }
        Ok(Self {
            max_concurrency,
            task_timeout,
            progress: None,
        })
    }

    pub fn from_settings(s: &ExecutorSettings) -> Result<Self, ExecutorError> {
        Self::new(s.max_concurrency, s.task_timeout())
    }

    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = Some(observer);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Run every connector for `date`. Returns one result per task, in completion order.
    ///
    /// Cancelling `parent` makes unfinished tasks report [`FetchError::Cancelled`];
    /// the call still returns a full result set.
    pub async fn run_batch(
        &self,
        parent: &CancellationToken,
        tasks: ConnectorSet,
        date: NaiveDate,
    ) -> Vec<ConnectorResult> {
        crate::telemetry::describe_metrics();

        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let gate = Arc::new(Semaphore::new(self.max_concurrency));
        let (tx, mut rx) = mpsc::channel::<ConnectorResult>(total);
        let mut pending: HashSet<String> = tasks.keys().cloned().collect();

        for (name, connector) in tasks {
            let task = ConnectorTask { name, connector };
            let tx = tx.clone();
            let gate = Arc::clone(&gate);
            let token = parent.child_token();
            let timeout = self.task_timeout;
            tokio::spawn(async move {
                let result = task.run(gate, token, timeout, date).await;
                // Buffer holds the whole batch; send only fails if the batch was dropped.
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(r) = rx.recv().await {
            pending.remove(&r.name);
            results.push(r);
            self.report_progress(results.len(), total);
        }

        // A worker that died without sending still owes a result.
        for name in pending {
            warn!(source = %name, "connector task exited without reporting");
            results.push(ConnectorResult::failed(
                name,
                FetchError::Panicked("task exited without reporting".to_string()),
                Duration::ZERO,
            ));
            self.report_progress(results.len(), total);
        }

        results
    }

    /// [`run_batch`](Self::run_batch) plus batch timing folded into [`ExecutionStats`].
    pub async fn run_batch_with_stats(
        &self,
        parent: &CancellationToken,
        tasks: ConnectorSet,
        date: NaiveDate,
    ) -> (Vec<ConnectorResult>, ExecutionStats) {
        let started = Instant::now();
        let results = self.run_batch(parent, tasks, date).await;
        let elapsed = started.elapsed();
        histogram!("fanout_batch_duration_ms").record(elapsed.as_secs_f64() * 1_000.0);

        let stats = ExecutionStats::from_results(&results, elapsed);
        info!(
            total = stats.total_connectors,
            ok = stats.successful_fetches,
            failed = stats.failed_fetches,
            activities = stats.total_activities,
            ms = elapsed.as_millis() as u64,
            "batch finished"
        );
        (results, stats)
    }

    fn report_progress(&self, completed: usize, total: usize) {
        if let Some(p) = &self.progress {
            p.on_progress(completed, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::connector::Connector;

    struct Fixed(usize);

    #[async_trait]
    impl Connector for Fixed {
        async fn fetch(&self, _ctx: &FetchContext, _date: NaiveDate) -> Result<Vec<Activity>> {
            Ok((0..self.0)
                .map(|i| Activity::new("fixed", Utc::now(), format!("item {i}")))
                .collect())
        }
        fn kind(&self) -> &'static str {
            "fixed"
        }
    }

    struct Panics;

    #[async_trait]
    impl Connector for Panics {
        async fn fetch(&self, _ctx: &FetchContext, _date: NaiveDate) -> Result<Vec<Activity>> {
            panic!("boom");
        }
        fn kind(&self) -> &'static str {
            "panics"
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    #[test]
    fn rejects_zero_limits() {
        assert_eq!(
            ParallelExecutor::new(0, Duration::from_secs(1)).err(),
            Some(ExecutorError::ZeroConcurrency)
        );
        assert_eq!(
            ParallelExecutor::new(1, Duration::ZERO).err(),
            Some(ExecutorError::ZeroTimeout)
        );
    }

    #[test]
    fn percent_complete_truncates_and_guards_zero() {
        assert_eq!(percent_complete(0, 0), 0);
        assert_eq!(percent_complete(1, 3), 33);
        assert_eq!(percent_complete(2, 3), 66);
        assert_eq!(percent_complete(3, 3), 100);
        assert_eq!(percent_complete(5, 3), 100);
    }

    #[tokio::test]
    async fn empty_batch_returns_nothing() {
        let ex = ParallelExecutor::new(2, Duration::from_secs(1)).unwrap();
        let (results, stats) = ex
            .run_batch_with_stats(&CancellationToken::new(), HashMap::new(), today())
            .await;
        assert!(results.is_empty());
        assert_eq!(stats.total_connectors, 0);
        assert_eq!(stats.success_rate_percent(), 0);
    }

    #[tokio::test]
    async fn panicking_connector_is_isolated() {
        let mut tasks: ConnectorSet = HashMap::new();
        tasks.insert("ok".into(), Arc::new(Fixed(2)));
        tasks.insert("bad".into(), Arc::new(Panics));

        let ex = ParallelExecutor::new(2, Duration::from_secs(1)).unwrap();
        let (results, stats) = ex
            .run_batch_with_stats(&CancellationToken::new(), tasks, today())
            .await;

        assert_eq!(results.len(), 2);
        let bad = results.iter().find(|r| r.name == "bad").unwrap();
        assert!(matches!(bad.error, Some(FetchError::Panicked(_))));
        let ok = results.iter().find(|r| r.name == "ok").unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.activities.len(), 2);
        assert_eq!(stats.successful_fetches, 1);
        assert_eq!(stats.failed_fetches, 1);
    }

    #[derive(Default)]
    struct Progress(Mutex<Vec<u32>>);

    impl ProgressObserver for Progress {
        fn on_progress(&self, completed: usize, total: usize) {
            self.0.lock().unwrap().push(percent_complete(completed, total));
        }
    }

    #[tokio::test]
    async fn progress_is_reported_per_result() {
        let mut tasks: ConnectorSet = HashMap::new();
        for n in ["a", "b", "c"] {
            tasks.insert(n.into(), Arc::new(Fixed(1)));
        }
        let progress = Arc::new(Progress::default());
        let ex = ParallelExecutor::new(3, Duration::from_secs(1))
            .unwrap()
            .with_progress(progress.clone());
        ex.run_batch(&CancellationToken::new(), tasks, today()).await;

        assert_eq!(*progress.0.lock().unwrap(), vec![33, 66, 100]);
    }
}
