//! Cache-aside configuration service.
//!
//! Reads go cache first and fall back to the repository on a miss; writes go
//! to the repository and then invalidate the entry plus both list aggregates
//! before returning. Invalidation is best-effort: a failed cache delete is
//! logged and counted, and the entry ages out through its TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_cache::{CacheError, SharedCache};
use quill_telemetry::{CacheScope, Metrics};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{decode_value, serialize_value};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    BulkConfigItem, ConfigEntry, ConfigFilter, ConfigPatch, ConfigType, ConfigUpdate,
    DeleteConfirmation, NewConfig, StoredConfig,
};
use crate::repository::{ConfigRepository, PgConfigRepository};

/// Prefix of single-entry cache keys.
pub const CACHE_KEY_PREFIX: &str = "config:";
/// Cache key of the full listing.
pub const ALL_CONFIGS_CACHE_KEY: &str = "config:all";
/// Cache key of the public-only listing.
pub const PUBLIC_CONFIGS_CACHE_KEY: &str = "config:all:public";
/// Lifetime of cached entries unless overridden.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Cache key for a single entry.
#[must_use]
pub fn entry_cache_key(key: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{key}")
}

const fn list_cache_key(public_only: bool) -> &'static str {
    if public_only {
        PUBLIC_CONFIGS_CACHE_KEY
    } else {
        ALL_CONFIGS_CACHE_KEY
    }
}

/// Tunables for [`ConfigService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// TTL applied to every cache write.
    pub cache_ttl: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Operations exposed to the rest of the application.
#[async_trait]
pub trait ConfigFacade: Send + Sync {
    /// Fetch one entry; `None` when the key does not exist.
    async fn get_config(&self, key: &str) -> ConfigResult<Option<ConfigEntry>>;
    /// List entries in store order, optionally only public ones.
    async fn get_all_configs(&self, public_only: bool) -> ConfigResult<Vec<ConfigEntry>>;
    /// Create or partially update one entry.
    async fn update_config(&self, key: &str, update: ConfigUpdate) -> ConfigResult<ConfigEntry>;
    /// Apply updates in order, stopping at the first failure without rollback.
    async fn bulk_update_configs(
        &self,
        items: Vec<BulkConfigItem>,
    ) -> ConfigResult<Vec<ConfigEntry>>;
    /// Remove one entry; a missing key is [`ConfigError::NotFound`].
    async fn delete_config(&self, key: &str) -> ConfigResult<DeleteConfirmation>;
    /// Drop the entry for `key` (if given) and both list aggregates from the cache.
    async fn clear_config_cache(&self, key: Option<&str>);
}

/// [`ConfigFacade`] over an injected repository and cache.
#[derive(Clone)]
pub struct ConfigService {
    repository: Arc<dyn ConfigRepository>,
    cache: SharedCache,
    metrics: Metrics,
    options: ServiceOptions,
}

impl ConfigService {
    /// Assemble a service from its collaborators.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ConfigRepository>,
        cache: SharedCache,
        metrics: Metrics,
        options: ServiceOptions,
    ) -> Self {
        Self {
            repository,
            cache,
            metrics,
            options,
        }
    }

    /// Connect to `PostgreSQL`, apply migrations and build a service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Store`] if the database is unreachable or
    /// migrations fail.
    #[instrument(name = "config_service.connect", skip(database_url, cache, metrics))]
    pub async fn connect(
        database_url: &str,
        cache: SharedCache,
        metrics: Metrics,
        options: ServiceOptions,
    ) -> ConfigResult<Self> {
        let repository = PgConfigRepository::connect(database_url).await?;
        info!(cache_backend = cache.backend(), "configuration service ready");
        Ok(Self::new(Arc::new(repository), cache, metrics, options))
    }

    /// Metrics recorded by this service.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Effective options.
    #[must_use]
    pub const fn options(&self) -> ServiceOptions {
        self.options
    }

    async fn cached<T: DeserializeOwned>(
        &self,
        cache_key: &str,
        scope: CacheScope,
    ) -> ConfigResult<Option<T>> {
        let cached = self
            .cache
            .get(cache_key)
            .await
            .map_err(|source| ConfigError::Cache {
                operation: "cache_get",
                source,
            })?;

        let Some(value) = cached else {
            self.metrics.inc_cache_miss(scope);
            debug!(cache_key, "configuration cache miss");
            return Ok(None);
        };
        let decoded = serde_json::from_value(value).map_err(|source| ConfigError::Cache {
            operation: "cache_get",
            source: CacheError::Decode {
                key: cache_key.to_string(),
                source,
            },
        })?;
        self.metrics.inc_cache_hit(scope);
        debug!(cache_key, "configuration cache hit");
        Ok(Some(decoded))
    }

    async fn fill_cache<T>(&self, cache_key: &str, value: &T) -> ConfigResult<()>
    where
        T: Serialize + Sync,
    {
        let encoded = serde_json::to_value(value).map_err(|source| ConfigError::Cache {
            operation: "cache_set",
            source: CacheError::Encode {
                key: cache_key.to_string(),
                source,
            },
        })?;
        self.cache
            .set(cache_key, &encoded, self.options.cache_ttl)
            .await
            .map_err(|source| ConfigError::Cache {
                operation: "cache_set",
                source,
            })
    }

    /// Persist one update and invalidate the affected cache entries.
    async fn write_entry(&self, key: &str, update: ConfigUpdate) -> ConfigResult<ConfigEntry> {
        validate_key(key)?;
        let stored = match self.repository.find_by_key(key).await? {
            None => self.repository.create(new_config(key, update)?).await?,
            Some(existing) => {
                let patch = config_patch(&existing, update)?;
                if patch.is_empty() {
                    existing
                } else {
                    self.repository.update(key, patch).await?
                }
            }
        };

        self.clear_config_cache(Some(key)).await;
        stored.into_entry()
    }

    async fn remove_entry(&self, key: &str) -> ConfigResult<DeleteConfirmation> {
        validate_key(key)?;
        let not_found = || ConfigError::NotFound {
            key: key.to_string(),
        };
        if self.repository.find_by_key(key).await?.is_none() {
            return Err(not_found());
        }
        if !self.repository.delete(key).await? {
            return Err(not_found());
        }

        self.clear_config_cache(Some(key)).await;
        Ok(DeleteConfirmation {
            key: key.to_string(),
            deleted: true,
        })
    }

    fn record_write<T>(&self, operation: &'static str, result: &ConfigResult<T>) {
        match result {
            Ok(_) => self.metrics.inc_config_write(operation),
            Err(_) => self.metrics.inc_config_write_failure(operation),
        }
    }
}

impl std::fmt::Debug for ConfigService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigService")
            .field("cache", &self.cache.backend())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Keys whose entry cache key would alias one of the listing aggregates.
fn is_reserved_key(key: &str) -> bool {
    [ALL_CONFIGS_CACHE_KEY, PUBLIC_CONFIGS_CACHE_KEY]
        .iter()
        .any(|list_key| list_key.strip_prefix(CACHE_KEY_PREFIX) == Some(key))
}

fn validate_key(key: &str) -> ConfigResult<()> {
    if key.trim().is_empty() || is_reserved_key(key) {
        return Err(ConfigError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn new_config(key: &str, update: ConfigUpdate) -> ConfigResult<NewConfig> {
    let value_type = update.value_type.unwrap_or_default();
    let value = match &update.value {
        Some(value) => serialize_value(key, value, value_type)?,
        None => None,
    };
    Ok(NewConfig {
        key: key.to_string(),
        value,
        value_type,
        description: update.description,
        is_public: update.is_public.unwrap_or(false),
    })
}

fn config_patch(existing: &StoredConfig, update: ConfigUpdate) -> ConfigResult<ConfigPatch> {
    let value_type = update.value_type.unwrap_or(existing.value_type);
    let value = match &update.value {
        Some(value) => Some(serialize_value(&existing.key, value, value_type)?),
        None => {
            if value_type != existing.value_type {
                ensure_retypeable(existing, value_type)?;
            }
            None
        }
    };
    Ok(ConfigPatch {
        value,
        value_type: update.value_type,
        description: update.description,
        is_public: update.is_public,
    })
}

/// A type-only change must leave the stored text decodable.
fn ensure_retypeable(existing: &StoredConfig, value_type: ConfigType) -> ConfigResult<()> {
    decode_value(&existing.key, existing.value.as_deref(), value_type)
        .map(drop)
        .map_err(|_| ConfigError::InvalidValue {
            key: existing.key.clone(),
            value_type,
            reason: "stored value does not match the new type",
        })
}

/// Bulk items carry composites (and every `json` value) as JSON text.
fn bulk_update(mut update: ConfigUpdate) -> ConfigUpdate {
    let json_typed = update.value_type == Some(ConfigType::Json);
    if let Some(value) = update.value.as_mut() {
        if !value.is_null() && (json_typed || value.is_object() || value.is_array()) {
            *value = Value::String(value.to_string());
        }
    }
    update
}

#[async_trait]
impl ConfigFacade for ConfigService {
    #[instrument(name = "config_service.get_config", skip(self))]
    async fn get_config(&self, key: &str) -> ConfigResult<Option<ConfigEntry>> {
        validate_key(key)?;
        let cache_key = entry_cache_key(key);
        if let Some(entry) = self.cached(&cache_key, CacheScope::Entry).await? {
            return Ok(Some(entry));
        }

        let Some(stored) = self.repository.find_by_key(key).await? else {
            debug!("configuration key not found");
            return Ok(None);
        };
        let entry = stored.into_entry().inspect_err(|err| {
            error!(error = %err, "stored configuration value is malformed");
        })?;
        self.fill_cache(&cache_key, &entry).await?;
        Ok(Some(entry))
    }

    #[instrument(name = "config_service.get_all_configs", skip(self))]
    async fn get_all_configs(&self, public_only: bool) -> ConfigResult<Vec<ConfigEntry>> {
        let cache_key = list_cache_key(public_only);
        if let Some(entries) = self.cached(cache_key, CacheScope::List).await? {
            return Ok(entries);
        }

        let entries = self
            .repository
            .find_all(ConfigFilter::from_public_only(public_only))
            .await?
            .into_iter()
            .map(StoredConfig::into_entry)
            .collect::<ConfigResult<Vec<_>>>()
            .inspect_err(|err| {
                error!(error = %err, "stored configuration value is malformed");
            })?;
        self.fill_cache(cache_key, &entries).await?;
        debug!(count = entries.len(), "configuration listing loaded");
        Ok(entries)
    }

    #[instrument(name = "config_service.update_config", skip(self, update))]
    async fn update_config(&self, key: &str, update: ConfigUpdate) -> ConfigResult<ConfigEntry> {
        let result = self.write_entry(key, update).await;
        self.record_write("update", &result);
        match &result {
            Ok(entry) => info!(value_type = %entry.value_type, "configuration updated"),
            Err(err) => warn!(error = %err, "configuration update failed"),
        }
        result
    }

    #[instrument(name = "config_service.bulk_update_configs", skip_all, fields(items = items.len()))]
    async fn bulk_update_configs(
        &self,
        items: Vec<BulkConfigItem>,
    ) -> ConfigResult<Vec<ConfigEntry>> {
        let mut committed = Vec::with_capacity(items.len());
        for (index, BulkConfigItem { key, update }) in items.into_iter().enumerate() {
            let result = self.write_entry(&key, bulk_update(update)).await;
            self.record_write("bulk_update", &result);
            match result {
                Ok(entry) => committed.push(entry),
                Err(source) => {
                    warn!(
                        index,
                        key = %key,
                        committed = committed.len(),
                        error = %source,
                        "bulk configuration update stopped; earlier items stay committed"
                    );
                    return Err(ConfigError::BulkUpdate {
                        index,
                        key,
                        committed,
                        source: Box::new(source),
                    });
                }
            }
        }
        info!(count = committed.len(), "bulk configuration update applied");
        Ok(committed)
    }

    #[instrument(name = "config_service.delete_config", skip(self))]
    async fn delete_config(&self, key: &str) -> ConfigResult<DeleteConfirmation> {
        let result = self.remove_entry(key).await;
        self.record_write("delete", &result);
        match &result {
            Ok(_) => info!("configuration deleted"),
            Err(err) => warn!(error = %err, "configuration delete failed"),
        }
        result
    }

    #[instrument(name = "config_service.clear_config_cache", skip(self))]
    async fn clear_config_cache(&self, key: Option<&str>) {
        let entry_key = key.map(entry_cache_key);
        let targets = entry_key
            .as_deref()
            .into_iter()
            .chain([ALL_CONFIGS_CACHE_KEY, PUBLIC_CONFIGS_CACHE_KEY]);

        for cache_key in targets {
            if let Err(err) = self.cache.delete(cache_key).await {
                self.metrics.inc_cache_invalidation_failure();
                error!(cache_key, error = %err, "failed to clear configuration cache entry");
            }
        }
    }
}
