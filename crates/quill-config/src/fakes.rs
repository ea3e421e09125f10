//! In-memory collaborators for service tests.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use quill_cache::{CacheError, CacheResult, CacheStore, MemoryCache};
use quill_data::DataError;
use quill_telemetry::Metrics;
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ConfigFilter, ConfigPatch, ConfigType, NewConfig, StoredConfig};
use crate::repository::ConfigRepository;
use crate::service::{ConfigService, ServiceOptions};

/// Vector-backed repository that keeps insertion order.
#[derive(Default)]
pub struct InMemoryRepository {
    rows: Mutex<Vec<StoredConfig>>,
    next_id: AtomicI64,
    find_calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl InMemoryRepository {
    fn rows(&self) -> MutexGuard<'_, Vec<StoredConfig>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fault(&self, operation: &'static str) -> ConfigResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ConfigError::Store {
                operation,
                source: DataError::QueryFailed {
                    operation,
                    source: sqlx::Error::PoolTimedOut,
                },
            });
        }
        Ok(())
    }

    pub fn insert(&self, config: NewConfig) -> StoredConfig {
        let now = Utc::now();
        let stored = StoredConfig {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            key: config.key,
            value: config.value,
            value_type: config.value_type,
            description: config.description,
            is_public: config.is_public,
            created_at: now,
            updated_at: now,
        };
        self.rows().push(stored.clone());
        stored
    }

    pub fn raw_value(&self, key: &str) -> Option<String> {
        self.rows()
            .iter()
            .find(|row| row.key == key)
            .and_then(|row| row.value.clone())
    }

    pub fn raw_type(&self, key: &str) -> Option<ConfigType> {
        self.rows()
            .iter()
            .find(|row| row.key == key)
            .map(|row| row.value_type)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows().iter().any(|row| row.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.find_calls.store(0, Ordering::SeqCst);
    }

    /// Make the next repository call fail with a store fault.
    pub fn fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigRepository for InMemoryRepository {
    async fn find_by_key(&self, key: &str) -> ConfigResult<Option<StoredConfig>> {
        self.fault("find_by_key")?;
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows().iter().find(|row| row.key == key).cloned())
    }

    async fn find_all(&self, filter: ConfigFilter) -> ConfigResult<Vec<StoredConfig>> {
        self.fault("find_all")?;
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows()
            .iter()
            .filter(|row| !filter.public_only() || row.is_public)
            .cloned()
            .collect())
    }

    async fn create(&self, config: NewConfig) -> ConfigResult<StoredConfig> {
        self.fault("create")?;
        Ok(self.insert(config))
    }

    async fn update(&self, key: &str, patch: ConfigPatch) -> ConfigResult<StoredConfig> {
        self.fault("update")?;
        let mut rows = self.rows();
        let row = rows
            .iter_mut()
            .find(|row| row.key == key)
            .ok_or_else(|| ConfigError::NotFound {
                key: key.to_string(),
            })?;
        if let Some(value) = patch.value {
            row.value = value;
        }
        if let Some(value_type) = patch.value_type {
            row.value_type = value_type;
        }
        if let Some(description) = patch.description {
            row.description = Some(description);
        }
        if let Some(is_public) = patch.is_public {
            row.is_public = is_public;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete(&self, key: &str) -> ConfigResult<bool> {
        self.fault("delete")?;
        let mut rows = self.rows();
        let before = rows.len();
        rows.retain(|row| row.key != key);
        Ok(rows.len() < before)
    }
}

/// Memory cache with switchable read and delete faults.
pub struct FlakyCache {
    inner: MemoryCache,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
    deletes: AtomicUsize,
}

fn injected_fault(key: &str) -> CacheError {
    let source = serde_json::from_str::<Value>("<cache offline>").expect_err("not JSON");
    CacheError::Decode {
        key: key.to_string(),
        source,
    }
}

impl FlakyCache {
    pub fn new(inner: MemoryCache) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            deletes: AtomicUsize::new(0),
        }
    }

    pub const fn inner(&self) -> &MemoryCache {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Delete attempts, failed ones included.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for FlakyCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected_fault(key));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected_fault(key));
        }
        self.inner.delete(key).await
    }

    fn backend(&self) -> &'static str {
        "flaky-memory"
    }
}

/// Service over a fresh in-memory cache and the given repository.
pub fn service_over(repository: Arc<InMemoryRepository>) -> anyhow::Result<ConfigService> {
    Ok(ConfigService::new(
        repository,
        Arc::new(MemoryCache::new()),
        Metrics::new()?,
        ServiceOptions::default(),
    ))
}
