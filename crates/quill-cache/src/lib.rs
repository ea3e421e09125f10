#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Process-wide cache backends for configuration reads.
//!
//! Layout: `store.rs` (the `CacheStore` contract), `memory.rs` (single-instance
//! `DashMap` cache with per-entry TTL), `redis.rs` (shared Redis cache),
//! `error.rs` (`CacheError`). [`create_cache_backend`] picks a backend from
//! [`CacheSettings`], degrading to memory when Redis is unreachable.

pub mod error;
pub mod memory;
pub mod redis;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use store::{CacheStore, SharedCache};

/// Default Redis connection pool size.
pub const DEFAULT_POOL_SIZE: usize = 8;
/// Default Redis connect/wait/recycle timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache backend selection.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Redis URL; `None` selects the in-memory backend.
    pub redis_url: Option<String>,
    /// Redis connection pool size.
    pub pool_size: usize,
    /// Redis connect/wait/recycle timeout.
    pub timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            pool_size: DEFAULT_POOL_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Build the cache backend described by `settings`.
///
/// Without a Redis URL the in-memory backend is used. When Redis is configured
/// but the pool cannot be created or the first connection fails, the process
/// keeps running on the in-memory backend and logs a warning.
pub async fn create_cache_backend(settings: &CacheSettings) -> SharedCache {
    let Some(url) = settings.redis_url.as_deref() else {
        info!("redis not configured; using in-memory cache");
        return Arc::new(MemoryCache::new());
    };

    let cache = match RedisCache::connect(url, settings.pool_size, settings.timeout) {
        Ok(cache) => cache,
        Err(err) => {
            warn!(error = %err, "failed to create redis pool; falling back to in-memory cache");
            return Arc::new(MemoryCache::new());
        }
    };

    match cache.ping().await {
        Ok(()) => {
            info!("connected to redis cache");
            Arc::new(cache)
        }
        Err(err) => {
            warn!(error = %err, "redis unreachable; falling back to in-memory cache");
            Arc::new(MemoryCache::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_redis_url_selects_memory_backend() {
        let cache = create_cache_backend(&CacheSettings::default()).await;
        assert_eq!(cache.backend(), "memory");
    }

    #[tokio::test]
    async fn malformed_redis_url_falls_back_to_memory() {
        let settings = CacheSettings {
            redis_url: Some("not a url".to_string()),
            timeout: Duration::from_millis(100),
            ..CacheSettings::default()
        };
        let cache = create_cache_backend(&settings).await;
        assert_eq!(cache.backend(), "memory");
    }
}
