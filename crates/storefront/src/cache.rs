//! Read-through cache for backend reads.
//!
//! Memoizes the result of an async read for a bounded time window, keyed by
//! a caller-supplied string. Values are stored type-erased so one cache can
//! hold product lists, single products and discount rules side by side.
//!
//! # Semantics
//!
//! - A hit requires an entry for the key, of the requested type, stored less
//!   than `ttl` ago. Hits never call `fetch`.
//! - A miss calls `fetch` exactly once. Concurrent misses for the same key are
//!   not coalesced: each caller fetches and the last write wins.
//! - Only `Ok(Some(value))` is stored. `Ok(None)` and errors are returned
//!   unchanged and never cached. There is no retry; wrap `fetch` if you want
//!   one.
//! - Expiry is checked on read only. Entries for keys that are no longer
//!   requested stay in memory until overwritten, invalidated or cleared, so an
//!   unbounded key space grows without bound unless `max_entries` is set.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::CacheConfig;

/// TTL used when neither the caller nor the configuration supplies one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A stored value and when it was stored.
#[derive(Clone)]
struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

/// Process-wide read-through cache.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct ReadThroughCache {
    entries: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl Default for ReadThroughCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ReadThroughCache {
    /// Create an unbounded cache with the given default TTL.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().build(),
            default_ttl,
        }
    }

    /// Create a cache that holds at most `max_entries` keys.
    ///
    /// When full, moka evicts by its admission policy; an evicted key is
    /// simply fetched again on its next read.
    #[must_use]
    pub fn with_capacity(default_ttl: Duration, max_entries: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
            default_ttl,
        }
    }

    /// Create a cache from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        match config.max_entries {
            Some(max_entries) => Self::with_capacity(config.ttl, max_entries),
            None => Self::new(config.ttl),
        }
    }

    /// The TTL applied when `get` is called without one.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the cached value for `key`, or call `fetch` and cache its result.
    ///
    /// `ttl` overrides the default TTL for this read only.
    ///
    /// # Errors
    ///
    /// Returns whatever error `fetch` returns, unchanged.
    pub async fn get<T, E, F, Fut>(
        &self,
        key: &str,
        fetch: F,
        ttl: Option<Duration>,
    ) -> Result<Option<T>, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let ttl = ttl.unwrap_or(self.default_ttl);

        if let Some(value) = self.lookup::<T>(key, ttl).await {
            trace!(key, "Cache hit");
            return Ok(Some(value));
        }

        debug!(key, "Cache miss");
        let fetched = fetch().await?;

        if let Some(value) = &fetched {
            let entry = CacheEntry {
                value: Arc::new(value.clone()),
                stored_at: Instant::now(),
            };
            self.entries.insert(key.to_owned(), entry).await;
        }

        Ok(fetched)
    }

    /// Remove a single entry. Removing an absent key is a no-op.
    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Number of stored entries, stale ones included.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn lookup<T>(&self, key: &str, ttl: Duration) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = self.entries.get(key).await?;
        if entry.stored_at.elapsed() >= ttl {
            return None;
        }
        entry.value.downcast::<T>().ok().map(|value| (*value).clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A fetch that counts its calls and returns `value`.
    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> std::future::Ready<Result<Option<String>, String>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(Some(value.to_string())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_read_within_ttl_is_served_from_cache() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get("k", counting_fetch(&calls, "v1"), None).await;
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache.get("k", counting_fetch(&calls, "v2"), None).await;

        assert_eq!(first.unwrap().as_deref(), Some("v1"));
        assert_eq!(second.unwrap().as_deref(), Some("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_ttl_fetches_again() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get("k", counting_fetch(&calls, "v1"), None)
            .await
            .unwrap();
        tokio::time::advance(DEFAULT_TTL).await;
        let second = cache
            .get("k", counting_fetch(&calls, "v2"), None)
            .await
            .unwrap();

        assert_eq!(second.as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_ttl_overrides_default() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let short = Some(Duration::from_secs(1));

        cache
            .get("k", counting_fetch(&calls, "v1"), short)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        cache
            .get("k", counting_fetch(&calls, "v2"), short)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err::<Option<String>, _>("backend down".to_string()))
            }
        };
        let err = cache.get("k", failing, None).await.unwrap_err();
        assert_eq!(err, "backend down");

        let value = cache
            .get("k", counting_fetch(&calls, "v1"), None)
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let empty = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok::<Option<String>, String>(None))
            }
        };
        assert_eq!(cache.get("k", empty, None).await.unwrap(), None);

        cache
            .get("k", counting_fetch(&calls, "v1"), None)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get("k", counting_fetch(&calls, "v1"), None)
            .await
            .unwrap();
        cache.invalidate("k").await;
        let value = cache
            .get("k", counting_fetch(&calls, "v2"), None)
            .await
            .unwrap();

        assert_eq!(value.as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Invalidating an absent key is a no-op
        cache.invalidate("missing").await;
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get("a", counting_fetch(&calls, "a"), None)
            .await
            .unwrap();
        cache
            .get("b", counting_fetch(&calls, "b"), None)
            .await
            .unwrap();
        assert_eq!(cache.len().await, 2);

        cache.clear();
        assert!(cache.is_empty().await);

        cache
            .get("a", counting_fetch(&calls, "a"), None)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = ReadThroughCache::default();

        cache
            .get("k", || std::future::ready(Ok::<_, String>(Some(42_u32))), None)
            .await
            .unwrap();
        let value = cache
            .get(
                "k",
                || std::future::ready(Ok::<_, String>(Some("text".to_string()))),
                None,
            )
            .await
            .unwrap();

        assert_eq!(value.as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn test_concurrent_misses_both_fetch() {
        let cache = ReadThroughCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Barrier::new(2));

        let slow_fetch = |value: &'static str| {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.wait().await;
                Ok::<_, String>(Some(value.to_string()))
            }
        };

        let (a, b) = tokio::join!(
            cache.get("k", slow_fetch("a"), None),
            cache.get("k", slow_fetch("b"), None),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Whichever write landed last is served, intact
        let cached = cache
            .get(
                "k",
                || std::future::ready(Ok::<Option<String>, String>(None)),
                None,
            )
            .await
            .unwrap();
        assert!(matches!(cached.as_deref(), Some("a" | "b")));
    }
}
