use lru::LruCache;
use parking_lot::Mutex;
use std::{
    hash::Hash,
    num::NonZeroUsize,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

/// Cache entry con expiración tras el último acceso
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    last_access: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            last_access: Instant::now(),
        }
    }

    fn is_expired(&self, expire_after_access: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_access) >= expire_after_access
    }
}

/// Bounded LRU store whose entries expire a fixed duration after their last read.
///
/// Reads refresh both the recency order and the access timestamp. Once the
/// store holds `max_size` entries, inserting a new key evicts the least
/// recently used one.
#[derive(Debug)]
pub struct LRUCache<K: Hash + Eq, V> {
    data: Mutex<LruCache<K, CacheEntry<V>>>,
    expire_after_access: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
}

impl<K, V> LRUCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(max_size: usize, expire_after_access: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            data: Mutex::new(LruCache::new(capacity)),
            expire_after_access,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_removals: AtomicU64::new(0),
        }
    }

    /// Returns a live value and refreshes its access time. Counts towards hit/miss metrics.
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.lookup(key);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Same as [`get`](Self::get) without touching the hit/miss counters.
    pub fn get_untracked(&self, key: &K) -> Option<V> {
        self.lookup(key)
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut data = self.data.lock();

        let expired = match data.get_mut(key) {
            Some(entry) if !entry.is_expired(self.expire_after_access, now) => {
                entry.last_access = now;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            data.pop(key);
            self.expired_removals.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    /// Inserts or overwrites `key`, evicting the least recently used entry when full.
    pub fn insert(&self, key: K, value: V) {
        let mut data = self.data.lock();
        if let Some((evicted, _)) = data.push(key.clone(), CacheEntry::new(value)) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.lock().cap().get()
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.lock();

        let keys_to_remove: Vec<K> = data
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.expire_after_access, now))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in keys_to_remove {
            if data.pop(&key).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.expired_removals
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Removed {} expired cache entries", removed);
        }

        removed
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_removals: self.expired_removals.load(Ordering::Relaxed),
        }
    }
}

/// Métricas básicas del cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}
