//! The cache contract consumed by the configuration service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheResult;

/// Key/value cache with per-entry expiry, shared across the process.
///
/// Single-key operations are atomic; nothing spans several keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry; expired or absent keys yield `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;
    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()>;
    /// Remove `key`; removing an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;
    /// Short backend label used in logs.
    fn backend(&self) -> &'static str;
}

/// Shared handle to the process-wide cache.
pub type SharedCache = Arc<dyn CacheStore>;
