//! TTL cache over the upstream alert feed.
//!
//! [`AlertCache::get_active_alerts`] serves the stored [`AlertSnapshot`] while
//! it is younger than [`ALERT_CACHE_TTL`] and otherwise refreshes it, with at
//! most one upstream fetch in flight:
//!
//! 1. Fast path: load the current snapshot (lock-free) and return it if fresh.
//! 2. Take the refresh lock and check again; a concurrent caller may have
//!    refreshed while this one waited.
//! 3. Join the in-flight fetch if there is one, otherwise start it.
//!
//! The fetch runs on its own task. A caller that gives up (timeout, dropped
//! request) does not cancel it: the fetch still completes and populates the
//! cache, and every caller waiting on that attempt sees the same result. A
//! failed fetch leaves the previous snapshot in place.
//!
//! The snapshot's `fetched_at` is the time the fetch *started*, read from an
//! injected [`Clock`] so tests can step time instead of sleeping.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::feed::{AlertFeed, FetchError};
use crate::models::AlertSnapshot;

/// How long a snapshot is served before the next call refreshes it.
pub const ALERT_CACHE_TTL: Duration = Duration::from_secs(20);

/// Source of "now" for freshness checks and snapshot timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type Refresh = Shared<BoxFuture<'static, Result<Arc<AlertSnapshot>, FetchError>>>;

struct CacheState {
    feed: Arc<dyn AlertFeed>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    snapshot: ArcSwapOption<AlertSnapshot>,
    /// The refresh lock; holds the in-flight fetch while one is running.
    inflight: Mutex<Option<Refresh>>,
}

impl CacheState {
    fn fresh(&self) -> Option<Arc<AlertSnapshot>> {
        let snapshot = self.snapshot.load_full()?;
        if self.clock.now() - snapshot.fetched_at < self.ttl {
            Some(snapshot)
        } else {
            None
        }
    }

    /// Spawn the upstream fetch. Must be called with the `inflight` lock held
    /// by the caller, which stores the returned future in the slot.
    fn start_refresh(self: &Arc<Self>) -> Refresh {
        let started_at = self.clock.now();
        let state = Arc::clone(self);

        let task = tokio::spawn(async move {
            let _clear = ClearInflight(Arc::clone(&state));
            tracing::debug!(feed = state.feed.name(), "refreshing alert snapshot");

            match state.feed.fetch_active_alerts().await {
                Ok(alerts) => {
                    let snapshot = Arc::new(AlertSnapshot {
                        alerts,
                        fetched_at: started_at,
                    });
                    state.snapshot.store(Some(Arc::clone(&snapshot)));
                    tracing::info!(
                        alerts = snapshot.alerts.len(),
                        fetched_at = %started_at,
                        "alert snapshot refreshed"
                    );
                    Ok(snapshot)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "alert feed refresh failed");
                    Err(err)
                }
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(join) => Err(FetchError::Aborted(join.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

/// Empties the in-flight slot when the fetch task ends, including by panic.
struct ClearInflight(Arc<CacheState>);

impl Drop for ClearInflight {
    fn drop(&mut self) {
        *self.0.inflight.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Shared handle to the alert cache. Cloning is cheap.
#[derive(Clone)]
pub struct AlertCache {
    state: Arc<CacheState>,
}

impl AlertCache {
    pub fn new(feed: Arc<dyn AlertFeed>) -> Self {
        Self::with_clock(feed, Arc::new(SystemClock))
    }

    pub fn with_clock(feed: Arc<dyn AlertFeed>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(CacheState {
                feed,
                clock,
                ttl: chrono::Duration::from_std(ALERT_CACHE_TTL).unwrap_or(chrono::Duration::MAX),
                snapshot: ArcSwapOption::empty(),
                inflight: Mutex::new(None),
            }),
        }
    }

    /// The current snapshot, refreshing it first if it is missing or stale.
    pub async fn get_active_alerts(&self) -> Result<Arc<AlertSnapshot>, FetchError> {
        if let Some(snapshot) = self.state.fresh() {
            return Ok(snapshot);
        }

        let refresh = {
            let mut slot = self
                .state
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(snapshot) = self.state.fresh() {
                return Ok(snapshot);
            }
            match slot.as_ref() {
                Some(refresh) => refresh.clone(),
                None => {
                    let refresh = self.state.start_refresh();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// The last stored snapshot, however old, without refreshing.
    pub fn peek(&self) -> Option<Arc<AlertSnapshot>> {
        self.state.snapshot.load_full()
    }
}
