//! Error types for configuration operations.

use quill_cache::CacheError;
use quill_data::DataError;
use thiserror::Error;

use crate::model::{ConfigEntry, ConfigType};

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key was empty or whitespace.
    #[error("invalid configuration key")]
    InvalidKey {
        /// Key payload provided by the caller.
        key: String,
    },
    /// Type name was not one of `string`, `number`, `boolean`, `json`.
    #[error("invalid configuration type")]
    InvalidType {
        /// Type payload provided by the caller or the store.
        value: String,
    },
    /// Value cannot be represented under its declared type.
    #[error("invalid configuration value")]
    InvalidValue {
        /// Key being written.
        key: String,
        /// Declared type the value was checked against.
        value_type: ConfigType,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// No entry exists for the key.
    #[error("configuration not found")]
    NotFound {
        /// Key that was looked up.
        key: String,
    },
    /// A stored value does not decode under its declared type.
    #[error("stored configuration value is malformed")]
    Decode {
        /// Key of the offending row.
        key: String,
        /// Declared type of the row.
        value_type: ConfigType,
        /// JSON parse failure, for `json` rows.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// Persistent store operation failed.
    #[error("configuration store operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: DataError,
    },
    /// Cache operation failed.
    #[error("configuration cache operation failed")]
    Cache {
        /// Operation identifier.
        operation: &'static str,
        /// Source cache error.
        source: CacheError,
    },
    /// A bulk update stopped at a failing item.
    ///
    /// Items before `index` are committed and are not rolled back; items
    /// after it were never attempted.
    #[error("bulk configuration update stopped at a failing item")]
    BulkUpdate {
        /// Zero-based position of the failing item.
        index: usize,
        /// Key of the failing item.
        key: String,
        /// Entries committed before the failure, in input order.
        committed: Vec<ConfigEntry>,
        /// Failure of the item at `index`.
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Whether the failure stems from caller input rather than infrastructure.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::InvalidKey { .. }
            | Self::InvalidType { .. }
            | Self::InvalidValue { .. }
            | Self::NotFound { .. } => true,
            Self::BulkUpdate { source, .. } => source.is_rejection(),
            Self::Decode { .. } | Self::Store { .. } | Self::Cache { .. } => false,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn bulk_update_exposes_item_failure_as_source() {
        let err = ConfigError::BulkUpdate {
            index: 1,
            key: "posts_per_page".to_string(),
            committed: Vec::new(),
            source: Box::new(ConfigError::InvalidValue {
                key: "posts_per_page".to_string(),
                value_type: ConfigType::Number,
                reason: "expected a number",
            }),
        };
        assert!(err.is_rejection());
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("invalid configuration value"));
    }

    #[test]
    fn decode_failures_are_not_rejections() {
        let err = ConfigError::Decode {
            key: "about_profile".to_string(),
            value_type: ConfigType::Json,
            source: None,
        };
        assert!(!err.is_rejection());
        assert!(err.source().is_none());
    }
}
