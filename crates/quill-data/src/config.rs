//! Site configuration schema migrations and stored-procedure wrappers.
//!
//! Every function is generic over the executor so callers can run it against
//! the pool directly or inside a transaction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, FromRow, PgPool, Postgres};
use tracing::debug;

use crate::error::{DataError, Result};

const MAX_CONNECTIONS: u32 = 8;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const FETCH_CONFIG_CALL: &str = "SELECT * FROM quill_config.fetch_config(_key => $1)";

const LIST_CONFIGS_CALL: &str =
    "SELECT * FROM quill_config.list_configs(_public_only => $1)";

const INSERT_CONFIG_CALL: &str = r"
    SELECT * FROM quill_config.insert_config(
        _key => $1,
        _value => $2,
        _type => $3,
        _description => $4,
        _is_public => $5
    )
";

const UPDATE_CONFIG_CALL: &str = r"
    SELECT * FROM quill_config.update_config(
        _key => $1,
        _set_value => $2,
        _value => $3,
        _type => $4,
        _description => $5,
        _is_public => $6
    )
";

const DELETE_CONFIG_CALL: &str = "SELECT quill_config.delete_config(_key => $1)";

fn map_query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

/// Open a connection pool against the configuration database.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn connect_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
        .map_err(|source| DataError::ConnectFailed { source })
}

/// Apply the configuration schema and default rows.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })?;
    debug!("site configuration migrations applied");
    Ok(())
}

/// Raw projection of the `site_config` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ConfigRow {
    /// Surrogate key; preserves insertion order for listings.
    pub id: i64,
    /// Unique configuration key.
    pub key: String,
    /// Stored textual value, `NULL` when unset.
    pub value: Option<String>,
    /// Declared value type (`string`, `number`, `boolean`, `json`).
    #[sqlx(rename = "type")]
    pub value_type: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Whether the value may be shown to unauthenticated callers.
    pub is_public: bool,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new configuration row.
#[derive(Debug, Clone, Copy)]
pub struct NewConfigRow<'a> {
    /// Unique configuration key.
    pub key: &'a str,
    /// Serialized value, `None` to store `NULL`.
    pub value: Option<&'a str>,
    /// Declared value type.
    pub value_type: &'a str,
    /// Optional description.
    pub description: Option<&'a str>,
    /// Public visibility flag.
    pub is_public: bool,
}

/// Partial update for an existing configuration row.
///
/// `None` leaves a column untouched. `value` is doubly optional so that an
/// explicit `NULL` can be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigRowPatch<'a> {
    /// Replacement value (`Some(None)` stores `NULL`).
    pub value: Option<Option<&'a str>>,
    /// Replacement type.
    pub value_type: Option<&'a str>,
    /// Replacement description.
    pub description: Option<&'a str>,
    /// Replacement visibility flag.
    pub is_public: Option<bool>,
}

impl ConfigRowPatch<'_> {
    /// Whether the patch touches no column at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.value_type.is_none()
            && self.description.is_none()
            && self.is_public.is_none()
    }

    const fn sets_value(&self) -> bool {
        self.value.is_some()
    }

    fn value_text(&self) -> Option<&str> {
        self.value.flatten()
    }
}

/// Load a configuration row by key.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_config_row<'e, E>(executor: E, key: &str) -> Result<Option<ConfigRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ConfigRow>(FETCH_CONFIG_CALL)
        .bind(key)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch config row"))
}

/// List configuration rows in insertion order, optionally only public ones.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn list_config_rows<'e, E>(executor: E, public_only: bool) -> Result<Vec<ConfigRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ConfigRow>(LIST_CONFIGS_CALL)
        .bind(public_only)
        .fetch_all(executor)
        .await
        .map_err(map_query_err("list config rows"))
}

/// Insert a new configuration row and return it as stored.
///
/// # Errors
///
/// Returns an error when the insert fails (including unique-key conflicts).
pub async fn insert_config_row<'e, E>(executor: E, row: &NewConfigRow<'_>) -> Result<ConfigRow>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ConfigRow>(INSERT_CONFIG_CALL)
        .bind(row.key)
        .bind(row.value)
        .bind(row.value_type)
        .bind(row.description)
        .bind(row.is_public)
        .fetch_one(executor)
        .await
        .map_err(map_query_err("insert config row"))
}

/// Apply a partial update to an existing row.
///
/// Returns `None` when no row exists for `key`.
///
/// # Errors
///
/// Returns an error when the update fails.
pub async fn update_config_row<'e, E>(
    executor: E,
    key: &str,
    patch: &ConfigRowPatch<'_>,
) -> Result<Option<ConfigRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ConfigRow>(UPDATE_CONFIG_CALL)
        .bind(key)
        .bind(patch.sets_value())
        .bind(patch.value_text())
        .bind(patch.value_type)
        .bind(patch.description)
        .bind(patch.is_public)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("update config row"))
}

/// Delete a configuration row, returning the number of rows removed.
///
/// # Errors
///
/// Returns an error when the delete fails.
pub async fn delete_config_row<'e, E>(executor: E, key: &str) -> Result<u64>
where
    E: Executor<'e, Database = Postgres>,
{
    let removed = sqlx::query_scalar::<_, i64>(DELETE_CONFIG_CALL)
        .bind(key)
        .fetch_one(executor)
        .await
        .map_err(map_query_err("delete config row"))?;
    Ok(u64::try_from(removed).unwrap_or_default())
}
