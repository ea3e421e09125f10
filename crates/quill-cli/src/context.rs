//! Settings resolution, shared command context, and CLI error types.

use std::env;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use quill_cache::{CacheSettings, create_cache_backend};
use quill_config::{ConfigError, ConfigFacade, ConfigService, ServiceOptions};
use quill_telemetry::Metrics;
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, OutputFormat};

const FALLBACK_DATABASE_URL_ENV: &str = "DATABASE_URL";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        if error.is_rejection() {
            return Self::Validation(describe_rejection(&error));
        }
        match &error {
            ConfigError::BulkUpdate {
                index,
                key,
                committed,
                ..
            } => {
                let summary = format!(
                    "bulk update stopped at item {index} ({key}) after {} item(s) were applied",
                    committed.len()
                );
                Self::Failure(anyhow::Error::new(error).context(summary))
            }
            _ => Self::Failure(anyhow::Error::new(error)),
        }
    }
}

fn describe_rejection(error: &ConfigError) -> String {
    match error {
        ConfigError::InvalidKey { key } => format!("invalid configuration key {key:?}"),
        ConfigError::InvalidType { value } => format!(
            "unknown configuration type {value:?} (expected string, number, boolean or json)"
        ),
        ConfigError::InvalidValue {
            key,
            value_type,
            reason,
        } => format!("value for {key} is not a valid {value_type}: {reason}"),
        ConfigError::NotFound { key } => format!("configuration {key} not found"),
        ConfigError::BulkUpdate {
            index,
            key,
            committed,
            source,
        } => format!(
            "bulk update stopped at item {index} ({key}) after {} item(s) were applied: {}",
            committed.len(),
            describe_rejection(source)
        ),
        other => other.to_string(),
    }
}

/// Connection and cache settings resolved from flags and the environment.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) database_url: String,
    pub(crate) cache: CacheSettings,
    pub(crate) cache_ttl: Duration,
}

impl Settings {
    pub(crate) fn from_cli(cli: &Cli) -> CliResult<Self> {
        let database_url = cli
            .database_url
            .clone()
            .or_else(|| env::var(FALLBACK_DATABASE_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                CliError::validation(
                    "database URL is required (pass --database-url or set QUILL_DATABASE_URL)",
                )
            })?;

        if cli.cache_ttl_secs == 0 {
            return Err(CliError::validation("cache TTL must be at least one second"));
        }

        let redis_url = cli.redis_url.clone().filter(|url| !url.trim().is_empty());

        Ok(Self {
            database_url,
            cache: CacheSettings {
                redis_url,
                ..CacheSettings::default()
            },
            cache_ttl: Duration::from_secs(cli.cache_ttl_secs),
        })
    }
}

/// Shared state handed to every command handler.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) facade: Arc<dyn ConfigFacade>,
    pub(crate) metrics: Metrics,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Build the cache backend and connect the configuration service.
    pub(crate) async fn connect(settings: &Settings, output: OutputFormat) -> CliResult<Self> {
        let cache = create_cache_backend(&settings.cache).await;
        let metrics = Metrics::new().map_err(CliError::failure)?;
        let service = ConfigService::connect(
            &settings.database_url,
            cache,
            metrics.clone(),
            ServiceOptions {
                cache_ttl: settings.cache_ttl,
            },
        )
        .await?;
        debug!(cache_ttl_secs = settings.cache_ttl.as_secs(), "cli context ready");
        Ok(Self {
            facade: Arc::new(service),
            metrics,
            output,
        })
    }

    pub(crate) fn facade(&self) -> &dyn ConfigFacade {
        self.facade.as_ref()
    }

    /// Counters recorded during this run, in Prometheus text format.
    pub(crate) fn metrics_report(&self) -> CliResult<String> {
        self.metrics.render().map_err(CliError::failure)
    }
}

/// Interpret a command-line value: JSON when it parses, otherwise plain text.
pub(crate) fn parse_value_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a `--type` argument.
pub(crate) fn parse_config_type(raw: &str) -> Result<quill_config::ConfigType, String> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<quill_config::ConfigType>()
        .map_err(|_| format!("unknown type {raw:?}; expected string, number, boolean or json"))
}
