// src/config/cache.rs
//! Time-gated, mtime-checked cache in front of a [`ConfigLoader`].
//!
//! Readers share an `RwLock` read guard and never block each other while the
//! snapshot is fresh. Once `check_interval` has passed, one caller takes the
//! write lock, stats the backing file and reloads only if its mtime advanced.
//! A failed reload keeps the previous snapshot.
//!
//! The read -> write transition is not atomic: two callers can both see a stale
//! check and queue for the write lock. The second one re-checks freshness after
//! acquiring it and returns the snapshot the first one just produced, so the worst
//! case is one redundant stat, never a divergent snapshot.

use anyhow::Result;
use metrics::counter;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::loader::ConfigLoader;

/// `tokio::time::interval` panics on a zero period.
const MIN_WATCH_PERIOD: Duration = Duration::from_millis(10);

struct CacheState<C> {
    config: Option<Arc<C>>,
    last_modified: Option<SystemTime>,
    last_check: Option<Instant>,
    loaded_at: Option<Instant>,
    check_interval: Duration,
}

impl<C> CacheState<C> {
    fn fresh(&self, now: Instant) -> Option<Arc<C>> {
        let last = self.last_check?;
        if now.saturating_duration_since(last) < self.check_interval {
            self.config.clone()
        } else {
            None
        }
    }
}

pub struct ConfigCache<L: ConfigLoader> {
    loader: L,
    state: RwLock<CacheState<L::Config>>,
}

impl<L: ConfigLoader> ConfigCache<L> {
    pub fn new(loader: L, check_interval: Duration) -> Self {
        Self {
            loader,
            state: RwLock::new(CacheState {
                config: None,
                last_modified: None,
                last_check: None,
                loaded_at: None,
                check_interval,
            }),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Perform the real read and initialize the cache. On failure the cache is left untouched.
    pub fn load(&self) -> Result<Arc<L::Config>> {
        let mut st = self.write();
        let mtime = self.stat();
        self.reload_locked(&mut st, mtime)
    }

    /// Return the cached snapshot, refreshing it if the check interval elapsed and
    /// the backing file changed. Errors only while nothing has ever been cached.
    pub fn get_config(&self) -> Result<Arc<L::Config>> {
        if let Some(cfg) = self.read().fresh(Instant::now()) {
            return Ok(cfg);
        }

        let mut st = self.write();
        let now = Instant::now();
        // Another caller may have finished a check while we waited for the write lock.
        if let Some(cfg) = st.fresh(now) {
            return Ok(cfg);
        }
        st.last_check = Some(now);

        let Some(current) = st.config.clone() else {
            let mtime = self.stat();
            return self.reload_locked(&mut st, mtime);
        };

        match self.loader.modified() {
            Ok(mtime) if st.last_modified.map_or(true, |prev| mtime > prev) => {
                match self.reload_locked(&mut st, Some(mtime)) {
                    Ok(cfg) => Ok(cfg),
                    Err(e) => {
                        warn!(
                            error = %format!("{e:#}"),
                            path = %self.loader.path().display(),
                            "config reload failed; keeping last good config"
                        );
                        Ok(current)
                    }
                }
            }
            Ok(_) => Ok(current),
            Err(e) => {
                debug!(error = %format!("{e:#}"), "config stat failed; keeping cached config");
                Ok(current)
            }
        }
    }

    /// Peek at the snapshot without any staleness check.
    pub fn cached(&self) -> Option<Arc<L::Config>> {
        self.read().config.clone()
    }

    /// Drop the snapshot; the next `get_config` reloads unconditionally.
    pub fn invalidate_cache(&self) {
        let mut st = self.write();
        st.config = None;
        st.last_modified = None;
        st.last_check = None;
        st.loaded_at = None;
        debug!(path = %self.loader.path().display(), "config cache invalidated");
    }

    pub fn set_check_interval(&self, interval: Duration) {
        self.write().check_interval = interval;
    }

    pub fn check_interval(&self) -> Duration {
        self.read().check_interval
    }

    /// One-line summary for status output.
    pub fn stats(&self) -> String {
        let st = self.read();
        let now = Instant::now();
        let interval = st.check_interval.as_secs_f64();
        match (st.config.is_some(), st.loaded_at, st.last_check) {
            (true, Some(loaded), Some(checked)) => format!(
                "config cache: age {:.1}s, last check {:.1}s ago, check interval {:.1}s",
                now.saturating_duration_since(loaded).as_secs_f64(),
                now.saturating_duration_since(checked).as_secs_f64(),
                interval
            ),
            _ => format!("config cache: empty, check interval {interval:.1}s"),
        }
    }

    fn stat(&self) -> Option<SystemTime> {
        match self.loader.modified() {
            Ok(t) => Some(t),
            Err(e) => {
                debug!(error = %format!("{e:#}"), "config stat failed before load");
                None
            }
        }
    }

    /// `mtime` must be read before `load`: a write racing the read then shows up
    /// as a newer mtime on the next check.
    fn reload_locked(
        &self,
        st: &mut CacheState<L::Config>,
        mtime: Option<SystemTime>,
    ) -> Result<Arc<L::Config>> {
        let cfg = match self.loader.load() {
            Ok(c) => Arc::new(c),
            Err(e) => {
                counter!("config_cache_reload_failures_total").increment(1);
                return Err(e);
            }
        };

        let now = Instant::now();
        st.config = Some(Arc::clone(&cfg));
        st.last_modified = mtime;
        st.last_check = Some(now);
        st.loaded_at = Some(now);
        counter!("config_cache_reloads_total").increment(1);
        info!(path = %self.loader.path().display(), "config loaded");
        Ok(cfg)
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState<L::Config>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState<L::Config>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L> ConfigCache<L>
where
    L: ConfigLoader + 'static,
    L::Config: 'static,
{
    /// Pre-warm loop: every `check_interval`, run `get_config` for its staleness check.
    /// Not needed for correctness; callers refresh on access anyway.
    pub fn spawn_watch(self: &Arc<Self>, stop: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut period = cache.check_interval().max(MIN_WATCH_PERIOD);
            let mut ticker = new_ticker(period);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        debug!("config watch stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let c = Arc::clone(&cache);
                        match tokio::task::spawn_blocking(move || c.get_config()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => warn!(error = %format!("{e:#}"), "config watch check failed"),
                            Err(e) => warn!(error = %e, "config watch task failed"),
                        }
                        let wanted = cache.check_interval().max(MIN_WATCH_PERIOD);
                        if wanted != period {
                            period = wanted;
                            ticker = new_ticker(period);
                        }
                    }
                }
            }
        })
    }
}

fn new_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
