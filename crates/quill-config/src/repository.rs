//! Persistent store contract and its `PostgreSQL` implementation.

use async_trait::async_trait;
use quill_data::config::{
    self as data_config, ConfigRow, ConfigRowPatch, NewConfigRow, connect_pool, run_migrations,
};
use quill_data::DataError;
use sqlx::PgPool;
use tracing::instrument;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ConfigFilter, ConfigPatch, NewConfig, StoredConfig};

/// Store of configuration rows keyed by `key`.
///
/// Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Load the row for `key`, if any.
    async fn find_by_key(&self, key: &str) -> ConfigResult<Option<StoredConfig>>;
    /// List rows in insertion order.
    async fn find_all(&self, filter: ConfigFilter) -> ConfigResult<Vec<StoredConfig>>;
    /// Insert a new row.
    async fn create(&self, config: NewConfig) -> ConfigResult<StoredConfig>;
    /// Apply a partial update; a missing row yields [`ConfigError::NotFound`].
    async fn update(&self, key: &str, patch: ConfigPatch) -> ConfigResult<StoredConfig>;
    /// Remove the row, reporting whether one existed.
    async fn delete(&self, key: &str) -> ConfigResult<bool>;
}

fn store_err(operation: &'static str) -> impl FnOnce(DataError) -> ConfigError {
    move |source| ConfigError::Store { operation, source }
}

fn into_stored(row: ConfigRow) -> ConfigResult<StoredConfig> {
    StoredConfig::try_from(row)
}

/// [`ConfigRepository`] backed by the `quill_config` schema.
#[derive(Debug, Clone)]
pub struct PgConfigRepository {
    pool: PgPool,
}

impl PgConfigRepository {
    /// Wrap an existing pool. Migrations are assumed to be applied.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Store`] if the database is unreachable or a
    /// migration fails.
    #[instrument(name = "config_repository.connect", skip(database_url))]
    pub async fn connect(database_url: &str) -> ConfigResult<Self> {
        let pool = connect_pool(database_url)
            .await
            .map_err(store_err("connect"))?;
        run_migrations(&pool)
            .await
            .map_err(store_err("migrate"))?;
        Ok(Self::new(pool))
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConfigRepository for PgConfigRepository {
    async fn find_by_key(&self, key: &str) -> ConfigResult<Option<StoredConfig>> {
        data_config::fetch_config_row(&self.pool, key)
            .await
            .map_err(store_err("find_by_key"))?
            .map(into_stored)
            .transpose()
    }

    async fn find_all(&self, filter: ConfigFilter) -> ConfigResult<Vec<StoredConfig>> {
        data_config::list_config_rows(&self.pool, filter.public_only())
            .await
            .map_err(store_err("find_all"))?
            .into_iter()
            .map(into_stored)
            .collect()
    }

    async fn create(&self, config: NewConfig) -> ConfigResult<StoredConfig> {
        let row = NewConfigRow {
            key: &config.key,
            value: config.value.as_deref(),
            value_type: config.value_type.as_str(),
            description: config.description.as_deref(),
            is_public: config.is_public,
        };
        data_config::insert_config_row(&self.pool, &row)
            .await
            .map_err(store_err("create"))
            .and_then(into_stored)
    }

    async fn update(&self, key: &str, patch: ConfigPatch) -> ConfigResult<StoredConfig> {
        let row_patch = ConfigRowPatch {
            value: patch.value.as_ref().map(Option::as_deref),
            value_type: patch.value_type.map(|value_type| value_type.as_str()),
            description: patch.description.as_deref(),
            is_public: patch.is_public,
        };
        data_config::update_config_row(&self.pool, key, &row_patch)
            .await
            .map_err(store_err("update"))?
            .ok_or_else(|| ConfigError::NotFound {
                key: key.to_string(),
            })
            .and_then(into_stored)
    }

    async fn delete(&self, key: &str) -> ConfigResult<bool> {
        let removed = data_config::delete_config_row(&self.pool, key)
            .await
            .map_err(store_err("delete"))?;
        Ok(removed > 0)
    }
}
