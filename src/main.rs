//! Activity aggregator: binary entrypoint.
//! Loads config, fans out to every enabled source for one day, prints the merged timeline.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use activity_aggregator::{
    build_connectors, combine_successful, sort_chronologically, telemetry, ClientPool,
    ConfigCache, ParallelExecutor, TomlFileLoader, TracingWarnings,
};

const ENV_METRICS: &str = "AGGREGATOR_METRICS";

fn install_metrics() -> Option<PrometheusHandle> {
    if !std::env::var(ENV_METRICS).ok().is_some_and(|v| v == "1") {
        return None;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(h) => Some(h),
        Err(e) => {
            warn!(error = %e, "prometheus recorder not installed");
            None
        }
    }
}

fn target_date() -> Result<NaiveDate> {
    match std::env::args().nth(1) {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("date must be YYYY-MM-DD, got {s:?}")),
        None => Ok(Local::now().date_naive()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();
    let metrics = install_metrics();

    let date = target_date()?;
    let loader = TomlFileLoader::from_env()?;
    let cache = Arc::new(ConfigCache::new(loader, std::time::Duration::from_secs(5)));
    let cfg = cache.load().context("loading aggregator config")?;
    cache.set_check_interval(cfg.cache.check_interval());

    let stop = CancellationToken::new();
    let watch = cache.spawn_watch(stop.clone());

    let pool = ClientPool::new();
    let connectors = build_connectors(&cfg, &pool)?;
    let configured = connectors.len();
    let executor = ParallelExecutor::from_settings(&cfg.executor)?;

    let shutdown = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    info!(%date, sources = configured, "fetching activities");
    let (results, stats) = executor.run_batch_with_stats(&stop, connectors, date).await;

    let mut activities = combine_successful(&results, &TracingWarnings);
    sort_chronologically(&mut activities);

    for a in &activities {
        println!(
            "{} [{}] {}",
            a.timestamp.with_timezone(&Local).format("%H:%M"),
            a.source,
            a.title
        );
    }
    println!("{stats}");
    if let Some((name, d)) = stats.slowest_source() {
        info!(source = name, ms = d.as_millis() as u64, "slowest source");
    }
    info!("{}", cache.stats());

    stop.cancel();
    if let Err(e) = watch.await {
        warn!(error = %e, "config watch task failed");
    }
    pool.close();

    if let Some(h) = metrics {
        eprintln!("{}", h.render());
    }

    if configured > 0 && stats.successful_fetches == 0 {
        bail!("all {configured} sources failed");
    }
    Ok(())
}
