use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    error::Error,
    fmt,
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{lru_cache::LRUCache, CacheMetrics, CachePolicy};

type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, CacheError<E>>>>;

/// Failure delivered to every caller waiting on the same load.
pub enum CacheError<E> {
    /// The loader itself failed. Shared between all waiters.
    Load(Arc<E>),
    /// The cache was shut down while the load was in flight.
    Cancelled,
    /// The load task panicked or was aborted by the runtime.
    Aborted(String),
}

impl<E> CacheError<E> {
    /// The loader's own error, if that is what failed.
    pub fn load_error(&self) -> Option<&E> {
        match self {
            CacheError::Load(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> Clone for CacheError<E> {
    fn clone(&self) -> Self {
        match self {
            CacheError::Load(e) => CacheError::Load(Arc::clone(e)),
            CacheError::Cancelled => CacheError::Cancelled,
            CacheError::Aborted(msg) => CacheError::Aborted(msg.clone()),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for CacheError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Load(e) => f.debug_tuple("Load").field(e).finish(),
            CacheError::Cancelled => f.write_str("Cancelled"),
            CacheError::Aborted(msg) => f.debug_tuple("Aborted").field(msg).finish(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for CacheError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Load(e) => write!(f, "cache loader failed: {}", e),
            CacheError::Cancelled => f.write_str("cache load cancelled by shutdown"),
            CacheError::Aborted(msg) => write!(f, "cache load task aborted: {}", msg),
        }
    }
}

impl<E: Error + 'static> Error for CacheError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Load(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Snapshot of a [`LoadingCache`]'s counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub name: &'static str,
    pub max_size: usize,
    pub entries: usize,
    pub in_flight: usize,
    pub loads: u64,
    pub load_failures: u64,
    pub metrics: CacheMetrics,
}

/// Single-flight async cache.
///
/// Resolved values live in a bounded [`LRUCache`]; loads that are still running
/// live in a separate table as shared futures, so every caller asking for the
/// same missing key awaits the same spawned task. Failed loads are never
/// stored. Cloning is cheap and yields a handle to the same cache.
pub struct LoadingCache<K: Hash + Eq, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

struct Inner<K: Hash + Eq, V, E> {
    name: &'static str,
    store: LRUCache<K, V>,
    in_flight: DashMap<K, SharedLoad<V, E>>,
    shutdown: CancellationToken,
    loads: AtomicU64,
    load_failures: AtomicU64,
}

impl<K: Hash + Eq, V, E> Clone for LoadingCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> LoadingCache<K, V, E>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        debug!(
            "Creating {} cache: max {} entries, expire after access {:?}",
            name, policy.max_size, policy.expire_after_access
        );
        Self {
            inner: Arc::new(Inner {
                name,
                store: LRUCache::new(policy.max_size, policy.expire_after_access),
                in_flight: DashMap::with_capacity(policy.initial_capacity),
                shutdown: CancellationToken::new(),
                loads: AtomicU64::new(0),
                load_failures: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Returns the cached value for `key`, or runs `init` to produce it.
    ///
    /// `init` is only polled on a miss, and only by the first caller: anyone
    /// else arriving while that load runs awaits its outcome instead of
    /// starting a second one.
    pub async fn get<F>(&self, key: K, init: F) -> Result<V, CacheError<E>>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.load_with(key, init.map(|result| result.map_err(|e| CacheError::Load(Arc::new(e)))))
            .await
    }

    /// Like [`get`](Self::get) for a synchronous loader, which runs on the blocking pool.
    pub async fn get_blocking<F>(&self, key: K, load: F) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Result<V, E> + Send + 'static,
    {
        let init = async move {
            match tokio::task::spawn_blocking(load).await {
                Ok(result) => result.map_err(|e| CacheError::Load(Arc::new(e))),
                Err(join_error) => Err(CacheError::Aborted(join_error.to_string())),
            }
        };
        self.load_with(key, init).await
    }

    /// Non-blocking read. Never starts a load.
    pub fn get_if_present(&self, key: &K) -> Option<V> {
        self.inner.store.get(key)
    }

    /// Unconditionally stores `value` under `key`.
    pub fn put(&self, key: K, value: V) {
        self.inner.store.insert(key, value);
    }

    async fn load_with<F>(&self, key: K, init: F) -> Result<V, CacheError<E>>
    where
        F: Future<Output = Result<V, CacheError<E>>> + Send + 'static,
    {
        if let Some(value) = self.inner.store.get(&key) {
            return Ok(value);
        }

        let load = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!("[{}] joining in-flight load for {:?}", self.inner.name, key);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                // A load for this key may have finished since the first check
                if let Some(value) = self.inner.store.get_untracked(&key) {
                    return Ok(value);
                }
                let load = self.spawn_load(key, init);
                entry.insert(load.clone());
                load
            }
        };

        load.await
    }

    fn spawn_load<F>(&self, key: K, init: F) -> SharedLoad<V, E>
    where
        F: Future<Output = Result<V, CacheError<E>>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let token = inner.shutdown.child_token();
        inner.loads.fetch_add(1, Ordering::Relaxed);
        debug!("[{}] loading {:?}", inner.name, key);

        let task = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
                key: key.clone(),
            };

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(CacheError::Cancelled),
                result = init => result,
            };

            match &outcome {
                Ok(value) => inner.store.insert(key, value.clone()),
                Err(_) => {
                    inner.load_failures.fetch_add(1, Ordering::Relaxed);
                    debug!("[{}] load for {:?} failed, nothing cached", inner.name, key);
                }
            }

            outcome
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(CacheError::Aborted(join_error.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    /// Sweeps expired entries every `every` until the cache is shut down or dropped.
    pub fn spawn_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let weak: Weak<Inner<K, V, E>> = Arc::downgrade(&self.inner);
        let token = self.inner.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + every, every);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        if inner.store.is_empty() {
                            continue;
                        }
                        let removed = inner.store.cleanup_expired();
                        if removed > 0 {
                            info!("🧹 [{}] cache cleanup: removed {} expired entries", inner.name, removed);
                        }
                    }
                }
            }
        })
    }

    /// Cancels every outstanding load without waiting for it. Cached values stay readable.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.store.len()
    }

    pub fn max_size(&self) -> usize {
        self.inner.store.capacity()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name(),
            max_size: self.max_size(),
            entries: self.inner.store.len(),
            in_flight: self.inner.in_flight.len(),
            loads: self.inner.loads.load(Ordering::Relaxed),
            load_failures: self.inner.load_failures.load(Ordering::Relaxed),
            metrics: self.inner.store.metrics(),
        }
    }
}

/// Clears the in-flight slot once the load task ends, including by panic or abort.
struct InFlightGuard<K: Hash + Eq, V, E> {
    inner: Arc<Inner<K, V, E>>,
    key: K,
}

impl<K: Hash + Eq, V, E> Drop for InFlightGuard<K, V, E> {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("boom {0}")]
    struct Boom(u32);

    async fn exploding() -> Result<u32, Boom> {
        panic!("loader exploded")
    }

    fn policy() -> CachePolicy {
        CachePolicy {
            initial_capacity: 4,
            max_size: 8,
            expire_after_access: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_hit_skips_loader() {
        let cache: LoadingCache<String, u32, Boom> = LoadingCache::new("test", policy());
        cache.put("a".into(), 1);

        let value = cache
            .get("a".into(), futures::future::ready(Err(Boom(0))))
            .await
            .unwrap();
        assert_eq!(value, 1);

        let stats = cache.stats();
        assert_eq!(stats.loads, 0);
        assert_eq!(stats.name, "test");
        assert_eq!(stats.max_size, 8);
        assert_eq!(stats.metrics.hits, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_load() {
        let cache: LoadingCache<String, u32, Boom> = LoadingCache::new("test", policy());
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                cache
                    .get("k".into(), async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        Ok(42)
                    })
                    .await
            }));
        }

        // Let every caller reach the cache before the loader is released
        while cache.stats().in_flight == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        release.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_if_present(&"k".to_string()), Some(42));
        assert_eq!(cache.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_cached() {
        let cache: LoadingCache<String, u32, Boom> = LoadingCache::new("test", policy());

        let release = Arc::new(Notify::new());
        let first = {
            let cache = cache.clone();
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                cache
                    .get("k".into(), async move {
                        release.notified().await;
                        Err(Boom(1))
                    })
                    .await
            })
        };
        while cache.stats().in_flight == 0 {
            tokio::task::yield_now().await;
        }
        let second = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("k".into(), async { Ok(7) }).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        release.notify_one();

        let first = first.await.unwrap().unwrap_err();
        let second = second.await.unwrap().unwrap_err();
        assert_eq!(first.load_error(), Some(&Boom(1)));
        assert_eq!(second.load_error(), Some(&Boom(1)));
        assert_eq!(cache.get_if_present(&"k".to_string()), None);

        // The next get runs the loader again
        let value = cache.get("k".into(), async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(cache.stats().loads, 2);
        assert_eq!(cache.stats().load_failures, 1);
    }

    #[tokio::test]
    async fn test_blocking_loader() {
        let cache: LoadingCache<u32, String, Boom> = LoadingCache::new("test", policy());

        let value = cache
            .get_blocking(3, || Ok::<_, Boom>("three".to_string()))
            .await
            .unwrap();
        assert_eq!(value, "three");

        let err = cache.get_blocking(4, || Err(Boom(4))).await.unwrap_err();
        assert_eq!(err.load_error(), Some(&Boom(4)));
        assert_eq!(cache.get_if_present(&3), Some("three".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_loads() {
        let cache: LoadingCache<String, u32, Boom> = LoadingCache::new("test", policy());
        cache.put("cached".into(), 1);

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get("slow".into(), futures::future::pending::<Result<u32, Boom>>())
                    .await
            })
        };
        while cache.stats().in_flight == 0 {
            tokio::task::yield_now().await;
        }

        cache.shutdown();
        assert!(matches!(pending.await.unwrap(), Err(CacheError::Cancelled)));
        assert!(cache.is_shut_down());
        assert_eq!(cache.get_if_present(&"cached".to_string()), Some(1));
        assert_eq!(cache.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_panicking_loader_does_not_wedge_key() {
        let cache: LoadingCache<String, u32, Boom> = LoadingCache::new("test", policy());

        let err = cache.get("k".into(), exploding()).await.unwrap_err();
        assert!(matches!(err, CacheError::Aborted(_)));

        let value = cache.get("k".into(), async { Ok(5) }).await.unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps_expired_entries() {
        let cache: LoadingCache<String, u32, Boom> = LoadingCache::new("test", policy());
        let cleanup = cache.spawn_cleanup(Duration::from_secs(30));
        cache.put("a".into(), 1);

        tokio::time::sleep(Duration::from_secs(91)).await;
        assert_eq!(cache.entry_count(), 0);

        cache.shutdown();
        cleanup.await.unwrap();
    }
}
