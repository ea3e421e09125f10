//! Shared cache backed by Redis through a `deadpool-redis` pool.
//!
//! Values are stored as JSON text with `SET .. EX`; expiry is handled by Redis.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use serde_json::Value;

use crate::error::{CacheError, CacheResult};
use crate::store::CacheStore;

/// Redis-backed [`CacheStore`].
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisCache {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool for `url`. No connection is opened until first use.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CreatePool`] when the URL or pool settings are invalid.
    pub fn connect(url: &str, pool_size: usize, timeout: Duration) -> CacheResult<Self> {
        let mut config = Config::from_url(url);
        let mut pool_config = PoolConfig::new(pool_size.max(1));
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|source| CacheError::CreatePool { source })?;
        Ok(Self::new(pool))
    }

    /// Open (and return to the pool) one connection to verify reachability.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Pool`] when no connection can be established.
    pub async fn ping(&self) -> CacheResult<()> {
        self.connection("ping").await.map(drop)
    }

    async fn connection(&self, operation: &'static str) -> CacheResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|source| CacheError::Pool { operation, source })
    }
}

/// Redis only takes whole seconds and rejects `EX 0`, so partial seconds
/// round up and the minimum is one.
fn expiry_seconds(ttl: Duration) -> u64 {
    (ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)).max(1)
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut conn = self.connection("get").await?;
        let raw: Option<String> = conn.get(key).await.map_err(|source| CacheError::Command {
            operation: "get",
            key: key.to_string(),
            source,
        })?;

        raw.map(|text| {
            serde_json::from_str(&text).map_err(|source| CacheError::Decode {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        let text = serde_json::to_string(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        let mut conn = self.connection("set").await?;
        conn.set_ex::<_, _, ()>(key, text, expiry_seconds(ttl))
            .await
            .map_err(|source| CacheError::Command {
                operation: "set",
                key: key.to_string(),
                source,
            })
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection("delete").await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|source| CacheError::Command {
                operation: "delete",
                key: key.to_string(),
                source,
            })
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
