//! A small read-mostly cache with a time-based freshness check.
//!
//! Shared by the pricing catalog and model catalog (C1/C2), both of which
//! load their data from disk and re-read it on a 5-minute TTL rather than on
//! every request. Concurrent readers are never blocked behind a refresh
//! beyond the first one to notice the cache is stale.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

pub(crate) struct TtlCache<T> {
    ttl: Duration,
    entry: RwLock<Option<(T, Instant)>>,
}

impl<T: Clone> TtlCache<T> {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Returns the cached value if still fresh, otherwise calls `load` once
    /// (double-checked against a thundering herd of concurrent refreshers)
    /// and caches the result.
    pub(crate) async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.fresh_value().await {
            return Ok(value);
        }

        let mut guard = self.entry.write().await;

        if let Some((value, cached_at)) = guard.as_ref()
            && cached_at.elapsed() < self.ttl
        {
            return Ok(value.clone());
        }

        let value = load().await?;
        *guard = Some((value.clone(), Instant::now()));

        Ok(value)
    }

    async fn fresh_value(&self) -> Option<T> {
        let guard = self.entry.read().await;
        let (value, cached_at) = guard.as_ref()?;

        (cached_at.elapsed() < self.ttl).then(|| value.clone())
    }

    /// Seeds the cache directly, bypassing `load`. Used by tests that need a
    /// fixture catalog without touching the filesystem.
    #[cfg(test)]
    pub(crate) async fn preload(&self, value: T) {
        *self.entry.write().await = Some((value, Instant::now()));
    }
}
