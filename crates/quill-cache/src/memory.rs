//! In-process cache backed by `DashMap`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::CacheResult;
use crate::store::CacheStore;

/// Every this many writes, `set` sweeps expired entries out of the map.
pub const PURGE_INTERVAL: usize = 64;

#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Single-instance cache with lazy per-entry expiry.
///
/// Reads evict the expired entry they hit; writes periodically sweep the
/// whole map so keys that are never read again do not linger. Clones share
/// the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CachedEntry>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until they are purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        // The shard guard must be released before `remove_if` touches the same shard.
        let lookup = self.entries.get(key).map(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match lookup {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value: value.clone(),
                cached_at: Instant::now(),
                ttl,
            },
        );
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes.is_multiple_of(PURGE_INTERVAL) {
            let purged = self.purge_expired();
            if purged > 0 {
                debug!(purged, "expired cache entries purged");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn set_then_get_returns_value() -> CacheResult<()> {
        let cache = MemoryCache::new();
        cache.set("config:site_name", &json!("My Blog"), HOUR).await?;
        assert_eq!(cache.get("config:site_name").await?, Some(json!("My Blog")));
        assert_eq!(cache.get("config:missing").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn null_values_are_cacheable() -> CacheResult<()> {
        let cache = MemoryCache::new();
        cache.set("config:site_logo", &Value::Null, HOUR).await?;
        assert_eq!(cache.get("config:site_logo").await?, Some(Value::Null));
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_are_misses_and_get_evicted() -> CacheResult<()> {
        let cache = MemoryCache::new();
        cache
            .set("config:all", &json!({"a": 1}), Duration::from_millis(20))
            .await?;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("config:all").await?, None);
        assert!(cache.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() -> CacheResult<()> {
        let cache = MemoryCache::new();
        cache.set("k", &json!(1), Duration::ZERO).await?;
        cache.set("k", &json!(2), HOUR).await?;
        assert_eq!(cache.get("k").await?, Some(json!(2)));
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> CacheResult<()> {
        let cache = MemoryCache::new();
        cache.set("k", &json!(true), HOUR).await?;
        cache.delete("k").await?;
        cache.delete("k").await?;
        assert_eq!(cache.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn clones_share_entries() -> CacheResult<()> {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache.set("k", &json!("v"), HOUR).await?;
        assert_eq!(other.get("k").await?, Some(json!("v")));
        Ok(())
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_entries() -> CacheResult<()> {
        let cache = MemoryCache::new();
        cache.set("stale", &json!(1), Duration::ZERO).await?;
        cache.set("live", &json!(2), HOUR).await?;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("live").await?, Some(json!(2)));
        Ok(())
    }

    #[tokio::test]
    async fn writes_periodically_sweep_expired_entries() -> CacheResult<()> {
        let cache = MemoryCache::new();
        cache.set("stale", &json!(1), Duration::ZERO).await?;
        for index in 1..PURGE_INTERVAL - 1 {
            cache.set(&format!("live_{index}"), &json!(index), HOUR).await?;
        }
        assert_eq!(cache.len(), PURGE_INTERVAL - 1);

        cache.set("last", &json!(0), HOUR).await?;
        assert_eq!(cache.len(), PURGE_INTERVAL - 1);
        assert_eq!(cache.get("last").await?, Some(json!(0)));
        Ok(())
    }
}
