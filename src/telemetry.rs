// src/telemetry.rs
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "AGGREGATOR_LOG_JSON";
const DEFAULT_FILTER: &str = "activity_aggregator=info,warn";

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `AGGREGATOR_LOG_JSON=1` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry.with(fmt::layer().compact().with_writer(std::io::stderr)).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// One-time metrics registration (so series show up in the exporter).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fanout_tasks_total", "Connector tasks executed.");
        describe_counter!("fanout_task_failures_total", "Connector tasks that ended with an error.");
        describe_counter!("fanout_task_timeouts_total", "Connector tasks that hit their deadline.");
        describe_histogram!("fanout_task_duration_ms", "Per-task fetch time in milliseconds.");
        describe_histogram!("fanout_batch_duration_ms", "Whole-batch wall time in milliseconds.");
        describe_counter!("client_pool_clients_created_total", "HTTP clients built by the pool.");
        describe_counter!(
            "client_pool_races_lost_total",
            "Candidate clients discarded after losing a first-create race."
        );
        describe_counter!("config_cache_reloads_total", "Successful config (re)loads.");
        describe_counter!(
            "config_cache_reload_failures_total",
            "Config loads that failed; last good config kept."
        );
    });
}
