//! # Cache Module
//!
//! Single-flight caching used to shield the YouTube Data API from repeated
//! and concurrent requests.
//!
//! ## Components
//!
//! - [`lru_cache::LRUCache`]: bounded store with least-recently-used
//!   eviction and expiry a fixed time after the **last access**.
//! - [`LoadingCache`]: wraps the store with single-flight loading. At most
//!   one load per key runs at a time; concurrent callers await the same task
//!   and receive the same value or the same failure. Failures are never
//!   cached.
//!
//! Both are generic and know nothing about songs or the catalog.
//!
//! ## Policies
//!
//! | cache  | initial capacity | max size | expire after access |
//! |--------|------------------|----------|---------------------|
//! | song   | 128              | 2048     | 30 minutes          |
//! | search | 128              | 512      | 10 minutes          |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use youtube_provider::cache::{CachePolicy, LoadingCache};
//!
//! # async fn example() {
//! let cache: LoadingCache<String, u64, std::io::Error> =
//!     LoadingCache::new("lengths", CachePolicy::SONGS);
//!
//! let length = cache
//!     .get("dQw4w9WgXcQ".to_string(), async { Ok(212) })
//!     .await;
//! assert_eq!(length.ok(), Some(212));
//!
//! // Served from memory, the loader is not polled
//! assert_eq!(cache.get_if_present(&"dQw4w9WgXcQ".to_string()), Some(212));
//! # }
//! ```

pub mod loading_cache;
pub mod lru_cache;

use std::time::Duration;

pub use loading_cache::{CacheError, CacheStats, LoadingCache};
pub use lru_cache::CacheMetrics;

/// Sizing and expiry for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Pre-allocated slots for in-flight loads.
    pub initial_capacity: usize,
    /// Entry count above which the least recently used entry is evicted.
    pub max_size: usize,
    /// Idle time after which an entry expires. Every read restarts it.
    pub expire_after_access: Duration,
}

impl CachePolicy {
    /// Resolved songs, keyed by video id.
    pub const SONGS: Self = Self {
        initial_capacity: 128,
        max_size: 2048,
        expire_after_access: Duration::from_secs(30 * 60),
    };

    /// First-page search results, keyed by trimmed query.
    pub const SEARCHES: Self = Self {
        initial_capacity: 128,
        max_size: 512,
        expire_after_access: Duration::from_secs(10 * 60),
    };

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_expire_after_access(mut self, expire_after_access: Duration) -> Self {
        self.expire_after_access = expire_after_access;
        self
    }
}
