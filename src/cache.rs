//! Time-bounded configuration cache with request deduplication.
//!
//! Entries expire once their age reaches the TTL: an entry stored at `t`
//! with a TTL of 300s is served at `t + 299s` and gone at `t + 300s`.
//! With a `max_entries` bound, inserting a new key into a full cache first
//! evicts the entry stored longest ago. Reads do not affect eviction order.
//!
//! [`ConfigCache::get_or_fetch`] collapses concurrent misses on one key into
//! a single fetch. The first caller starts the fetch on the runtime; later
//! callers subscribe to its result. The fetch is not tied to any caller and
//! runs to completion even if every caller goes away, so its result still
//! lands in the cache.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use checkout_fields::cache::{ConfigCache, ManualClock};
//! use checkout_fields::settings::CacheSettings;
//!
//! let clock = Arc::new(ManualClock::default());
//! let cache = ConfigCache::with_clock(CacheSettings::default(), clock.clone());
//!
//! cache.set("token_sandbox", 42u32);
//! clock.advance(Duration::from_secs(299));
//! assert_eq!(cache.get("token_sandbox"), Some(42));
//!
//! clock.advance(Duration::from_secs(1));
//! assert_eq!(cache.get("token_sandbox"), None);
//! ```

use crate::error::{CheckoutError, Result};
use crate::settings::{saturating_millis, CacheSettings};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Source of the current time for cache timestamps.
pub trait Clock: Send + Sync {
    /// Time elapsed since a fixed origin.
    fn now(&self) -> Duration;
}

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// A clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Wall clock measured from the Unix epoch.
///
/// Used where timestamps must survive a restart, such as persisted expiry.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixClock;

impl Clock for UnixClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Moves the clock forward, stopping at the largest representable time.
    pub fn advance(&self, by: Duration) {
        let by = saturating_millis(by);
        let _ = self
            .millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by))
            });
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, at: Duration) {
        self.millis.store(saturating_millis(at), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

struct Entry<P> {
    payload: P,
    stored_at: Duration,
}

type Settled<P> = Option<Result<P>>;

struct Inner<P> {
    entries: Mutex<HashMap<String, Entry<P>>>,
    in_flight: Mutex<HashMap<String, watch::Receiver<Settled<P>>>>,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    fetches: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed cache of configuration payloads.
///
/// Cloning is cheap and clones share the same entries.
pub struct ConfigCache<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for ConfigCache<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Removes the in-flight record when dropped.
///
/// Created as soon as the record is inserted, so a panic in the fetch
/// closure, in `spawn`, or in the fetch itself still releases the key.
struct Registration<P> {
    cache: ConfigCache<P>,
    key: String,
}

impl<P> Drop for Registration<P> {
    fn drop(&mut self) {
        lock(&self.cache.inner.in_flight).remove(&self.key);
    }
}

enum Role<P> {
    Leader(watch::Sender<Settled<P>>),
    Follower(watch::Receiver<Settled<P>>),
}

impl<P> ConfigCache<P>
where
    P: Clone + Send + Sync + 'static,
{
    /// Creates a cache on the system clock.
    pub fn new(settings: CacheSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock::new()))
    }

    /// Creates a cache on the given clock.
    pub fn with_clock(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                settings,
                clock,
                fetches: AtomicU64::new(0),
            }),
        }
    }

    /// Settings the cache was built with.
    #[inline]
    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    fn is_expired(&self, entry: &Entry<P>, now: Duration) -> bool {
        now.saturating_sub(entry.stored_at) >= self.inner.settings.ttl
    }

    /// Returns the payload under `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<P> {
        let now = self.inner.clock.now();
        let mut entries = lock(&self.inner.entries);
        let expired = self.is_expired(entries.get(key)?, now);
        if expired {
            entries.remove(key);
            trace!(key, "cache entry expired");
            return None;
        }
        entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Stores `payload` under `key` with the current time.
    pub fn set(&self, key: impl Into<String>, payload: P) {
        let key = key.into();
        let stored_at = self.inner.clock.now();
        let mut entries = lock(&self.inner.entries);

        if let Some(max) = self.inner.settings.max_entries {
            if max == 0 {
                trace!(key = %key, "cache disabled, not storing");
                return;
            }
            if !entries.contains_key(&key) && entries.len() >= max {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    debug!(evicted = %oldest, "cache full, evicted oldest entry");
                }
            }
        }

        entries.insert(key, Entry { payload, stored_at });
    }

    /// Removes `key`. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        lock(&self.inner.entries).remove(key).is_some()
    }

    /// Removes every entry.
    pub fn invalidate_all(&self) {
        lock(&self.inner.entries).clear();
    }

    /// Removes expired entries. Returns how many were removed.
    pub fn invalidate_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut entries = lock(&self.inner.entries);
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Removes every entry whose key matches. Returns how many were removed.
    pub fn invalidate_matching(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut entries = lock(&self.inner.entries);
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    /// Restamps a live entry with the current time.
    ///
    /// Expired entries are left as they are. Returns whether the entry was restamped.
    pub fn refresh(&self, key: &str) -> bool {
        let now = self.inner.clock.now();
        let mut entries = lock(&self.inner.entries);
        match entries.get_mut(key) {
            Some(entry) if now.saturating_sub(entry.stored_at) < self.inner.settings.ttl => {
                entry.stored_at = now;
                true
            }
            _ => false,
        }
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetches started by [`get_or_fetch`](Self::get_or_fetch).
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// True while a fetch for `key` is outstanding.
    pub fn is_fetching(&self, key: &str) -> bool {
        lock(&self.inner.in_flight).contains_key(key)
    }

    /// Returns the cached payload or fetches it, sharing one fetch per key.
    ///
    /// `fetch` is only called by the caller that starts the fetch. Successful
    /// results are stored before any caller is woken. Failures are not cached:
    /// the next miss fetches again.
    ///
    /// Must be called within a tokio runtime.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<P>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<P>> + Send + 'static,
    {
        if let Some(payload) = self.get(key) {
            trace!(key, "cache hit");
            return Ok(payload);
        }

        let role = {
            let mut in_flight = lock(&self.inner.in_flight);
            match in_flight.get(key) {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    // Re-check under the in-flight lock: a fetch may have
                    // settled between the miss above and taking the lock.
                    if let Some(payload) = self.get(key) {
                        return Ok(payload);
                    }
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(key.to_string(), rx);
                    Role::Leader(tx)
                }
            }
        };

        let mut rx = match role {
            Role::Follower(rx) => {
                debug!(key, "joining in-flight fetch");
                rx
            }
            Role::Leader(tx) => {
                self.inner.fetches.fetch_add(1, Ordering::SeqCst);
                debug!(key, "cache miss, fetching");
                let registration = Registration {
                    cache: self.clone(),
                    key: key.to_string(),
                };
                let rx = tx.subscribe();
                let fut = fetch();
                tokio::spawn(async move {
                    let result = fut.await;
                    match &result {
                        Ok(payload) => registration
                            .cache
                            .set(registration.key.clone(), payload.clone()),
                        Err(err) => warn!(key = %registration.key, error = %err, "fetch failed"),
                    }
                    drop(registration);
                    tx.send_replace(Some(result));
                });
                rx
            }
        };

        let settled = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CheckoutError::FetchFailed("fetch task ended without a result".into()))?;
        match &*settled {
            Some(result) => result.clone(),
            None => Err(CheckoutError::FetchFailed("fetch settled without a result".into())),
        }
    }
}

impl<P> fmt::Debug for ConfigCache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigCache")
            .field("entries", &lock(&self.inner.entries).len())
            .field("in_flight", &lock(&self.inner.in_flight).len())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn cache(max_entries: Option<usize>) -> (ConfigCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let settings = CacheSettings {
            ttl: Duration::from_secs(300),
            max_entries,
        };
        (ConfigCache::with_clock(settings, clock.clone()), clock)
    }

    #[test]
    fn test_ttl_boundary() {
        let (cache, clock) = cache(None);
        cache.set("k", "v".to_string());
        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_set_overwrites_and_restamps() {
        let (cache, clock) = cache(None);
        cache.set("k", "a".to_string());
        clock.advance(Duration::from_secs(200));
        cache.set("k", "b".to_string());
        clock.advance(Duration::from_secs(200));
        assert_eq!(cache.get("k").as_deref(), Some("b"));
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let (cache, clock) = cache(Some(3));
        for i in 1..=4 {
            cache.set(format!("key-{i}"), format!("v{i}"));
            clock.advance(Duration::from_secs(1));
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("key-1"), None);
        assert!(cache.get("key-2").is_some());
        assert!(cache.get("key-4").is_some());
    }

    #[test]
    fn test_updating_existing_key_does_not_evict() {
        let (cache, clock) = cache(Some(2));
        cache.set("a", "1".to_string());
        clock.advance(Duration::from_secs(1));
        cache.set("b", "2".to_string());
        cache.set("a", "3".to_string());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_reads_do_not_change_eviction_order() {
        let (cache, clock) = cache(Some(2));
        cache.set("a", "1".to_string());
        clock.advance(Duration::from_secs(1));
        cache.set("b", "2".to_string());
        assert!(cache.get("a").is_some());
        cache.set("c", "3".to_string());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_refresh_extends_live_entry() {
        let (cache, clock) = cache(None);
        cache.set("k", "v".to_string());
        clock.advance(Duration::from_secs(250));
        assert!(cache.refresh("k"));
        clock.advance(Duration::from_secs(250));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_refresh_does_not_resurrect() {
        let (cache, clock) = cache(None);
        cache.set("k", "v".to_string());
        clock.advance(Duration::from_secs(300));
        assert!(!cache.refresh("k"));
        assert_eq!(cache.get("k"), None);
        assert!(!cache.refresh("missing"));
    }

    #[test]
    fn test_invalidation() {
        let (cache, clock) = cache(None);
        cache.set("tok_sandbox", "a".to_string());
        cache.set("tok_production", "b".to_string());
        cache.set("other_sandbox", "c".to_string());

        assert!(cache.invalidate("other_sandbox"));
        assert!(!cache.invalidate("other_sandbox"));
        assert_eq!(cache.invalidate_matching(|k| k.starts_with("tok_")), 2);
        assert!(cache.is_empty());

        cache.set("old", "x".to_string());
        clock.advance(Duration::from_secs(200));
        cache.set("new", "y".to_string());
        clock.advance(Duration::from_secs(100));
        assert_eq!(cache.invalidate_expired(), 1);
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_result() {
        let (cache, _) = cache(None);
        let value = cache
            .get_or_fetch("k", || async { Ok("fetched".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fetched");
        assert_eq!(cache.get("k").as_deref(), Some("fetched"));

        let value = cache
            .get_or_fetch("k", || async { Ok("again".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fetched");
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let (cache, _) = cache(None);
        let err = cache
            .get_or_fetch("k", || async { Err(CheckoutError::FetchFailed("offline".into())) })
            .await
            .unwrap_err();
        assert_eq!(err, CheckoutError::FetchFailed("offline".into()));
        assert!(!cache.is_fetching("k"));

        let value = cache
            .get_or_fetch("k", || async { Ok("ok".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_fetch() {
        let (cache, _) = cache(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = watch::channel(false);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            let gate = gate.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("shared", move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move {
                            let mut gate = gate;
                            let _ = gate.wait_for(|open| *open).await;
                            Ok("config".to_string())
                        }
                    })
                    .await
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        release.send_replace(true);
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "config");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.fetch_count(), 1);
        assert!(!cache.is_fetching("shared"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_keys_fetch_independently() {
        let (cache, _) = cache(None);
        let mut tasks = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("key-{i}");
                cache
                    .get_or_fetch(&key, move || async move { Ok(format!("v{i}")) })
                    .await
            }));
        }
        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap().unwrap(), format!("v{i}"));
        }
        assert_eq!(cache.fetch_count(), 8);
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let (cache, _) = cache(Some(0));
        cache.set("k", "v".to_string());
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_manual_clock_saturates() {
        let clock = ManualClock::default();
        clock.set(Duration::MAX);
        assert_eq!(clock.now(), Duration::from_millis(u64::MAX));

        let clock = ManualClock::default();
        clock.advance(Duration::from_millis(u64::MAX - 1));
        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now(), Duration::from_millis(u64::MAX));
    }

    fn panicking_fetch() -> Result<String> {
        panic!("fetch blew up")
    }

    #[tokio::test]
    async fn test_panic_starting_fetch_releases_key() {
        let (cache, _) = cache(None);
        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("k", || std::future::ready(panicking_fetch()))
                    .await
            })
        };
        assert!(first.await.unwrap_err().is_panic());
        assert!(!cache.is_fetching("k"));

        let value = cache
            .get_or_fetch("k", || async { Ok("ok".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_panic_during_fetch_releases_key() {
        let (cache, _) = cache(None);
        let err = cache
            .get_or_fetch("k", || async { panicking_fetch() })
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::FetchFailed(_)));
        assert!(!cache.is_fetching("k"));

        let value = cache
            .get_or_fetch("k", || async { Ok("ok".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "ok");
    }

    #[test]
    fn test_cache_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigCache<String>>();
    }
}
