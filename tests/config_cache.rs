// tests/config_cache.rs
//! ConfigCache against a real TOML file on disk.
//! mtimes are set explicitly so the tests do not depend on filesystem timestamp granularity.

use activity_aggregator::config::{AppConfig, ConfigCache, ConfigLoader, TomlFileLoader};
use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Delegates to the TOML loader and counts file stats.
struct CountingLoader {
    inner: TomlFileLoader,
    stats: AtomicUsize,
}

impl ConfigLoader for CountingLoader {
    type Config = AppConfig;

    fn path(&self) -> &Path {
        self.inner.path()
    }

    fn load(&self) -> Result<AppConfig> {
        self.inner.load()
    }

    fn modified(&self) -> Result<SystemTime> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        self.inner.modified()
    }
}

fn write_with_mtime(path: &Path, content: &str, mtime: SystemTime) {
    fs::write(path, content).unwrap();
    let f = fs::File::options().write(true).open(path).unwrap();
    f.set_modified(mtime).unwrap();
}

fn base_time() -> SystemTime {
    SystemTime::now() - Duration::from_secs(3600)
}

fn counting_cache(path: &Path, interval: Duration) -> ConfigCache<CountingLoader> {
    ConfigCache::new(
        CountingLoader {
            inner: TomlFileLoader::new(path),
            stats: AtomicUsize::new(0),
        },
        interval,
    )
}

#[test]
fn cached_within_interval_then_refreshed_after_change() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("aggregator.toml");
    let t0 = base_time();
    write_with_mtime(&p, "[executor]\nmax_concurrency = 1\n", t0);

    let cache = counting_cache(&p, Duration::from_millis(100));
    cache.load().unwrap();
    assert_eq!(cache.loader().stats.load(Ordering::SeqCst), 1);

    let a = cache.get_config().unwrap();
    let b = cache.get_config().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.loader().stats.load(Ordering::SeqCst), 1);

    write_with_mtime(
        &p,
        "[executor]\nmax_concurrency = 2\n",
        t0 + Duration::from_secs(10),
    );
    // Still inside the window: old instance, no stat.
    assert_eq!(cache.get_config().unwrap().executor.max_concurrency, 1);

    std::thread::sleep(Duration::from_millis(150));
    let c = cache.get_config().unwrap();
    assert_eq!(c.executor.max_concurrency, 2);
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn broken_edit_keeps_last_good_config() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("aggregator.toml");
    let t0 = base_time();
    write_with_mtime(&p, "[executor]\nmax_concurrency = 3\n", t0);

    let cache = counting_cache(&p, Duration::ZERO);
    let good = cache.load().unwrap();

    write_with_mtime(&p, "[executor\nmax_concurrency = ", t0 + Duration::from_secs(5));
    let got = cache.get_config().unwrap();
    assert!(Arc::ptr_eq(&good, &got));

    // File removed entirely: still serving the last good config.
    fs::remove_file(&p).unwrap();
    assert_eq!(cache.get_config().unwrap().executor.max_concurrency, 3);
}

#[test]
fn invalidate_then_get_reloads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("aggregator.toml");
    let t0 = base_time();
    write_with_mtime(&p, "[cache]\ncheck_interval_secs = 9\n", t0);

    let cache = counting_cache(&p, Duration::from_secs(60));
    let first = cache.load().unwrap();

    // Same mtime, different content; only an invalidate picks it up.
    write_with_mtime(&p, "[cache]\ncheck_interval_secs = 1\n", t0);
    assert_eq!(cache.get_config().unwrap().cache.check_interval_secs, 9);

    cache.invalidate_cache();
    let second = cache.get_config().unwrap();
    assert_eq!(second.cache.check_interval_secs, 1);
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn missing_file_on_first_load_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let cache = counting_cache(&dir.path().join("absent.toml"), Duration::from_secs(1));
    assert!(cache.load().is_err());
    assert!(cache.get_config().is_err());
    assert!(cache.stats().contains("empty"));
}
