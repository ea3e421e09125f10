//! Typed configuration models and change payloads.
//!
//! # Design
//! - `ConfigEntry` is the decoded, cacheable view handed to callers.
//! - `StoredConfig` mirrors a persisted row and keeps the raw text.
//! - `NewConfig` / `ConfigPatch` are repository-level write payloads.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use quill_data::ConfigRow;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::codec::decode_value;
use crate::error::{ConfigError, ConfigResult};

/// Declared type of a configuration value; drives encode/decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// Free text, stored verbatim.
    #[default]
    String,
    /// Integer or floating-point number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Arbitrary JSON document.
    Json,
}

impl ConfigType {
    /// Every supported type, in declaration order.
    pub const ALL: [Self; 4] = [Self::String, Self::Number, Self::Boolean, Self::Json];

    /// Render the type as its lowercase storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
        }
    }
}

impl Display for ConfigType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidType {
                value: s.to_string(),
            })
    }
}

/// Decoded configuration entry, as returned to callers and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique key.
    pub key: String,
    /// Value decoded per `value_type`; `null` when unset.
    pub value: Value,
    /// Declared type.
    #[serde(rename = "type")]
    pub value_type: ConfigType,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether unauthenticated callers may read the entry.
    pub is_public: bool,
}

/// Partial update for a single entry; `None` fields are left untouched.
///
/// `value` distinguishes an absent field (`None`) from an explicit JSON
/// `null` (`Some(Value::Null)`), which clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// Replacement value.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Replacement type; also selects how `value` is serialized.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ConfigType>,
    /// Replacement description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement visibility flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ConfigUpdate {
    /// Update that only replaces the value.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Set the declared type.
    #[must_use]
    pub const fn with_type(mut self, value_type: ConfigType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the visibility flag.
    #[must_use]
    pub const fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }
}

/// One item of a bulk update request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkConfigItem {
    /// Key to create or update.
    pub key: String,
    /// Fields to apply.
    #[serde(flatten)]
    pub update: ConfigUpdate,
}

impl BulkConfigItem {
    /// Pair a key with an update.
    #[must_use]
    pub fn new(key: impl Into<String>, update: ConfigUpdate) -> Self {
        Self {
            key: key.into(),
            update,
        }
    }
}

/// Acknowledgement returned by a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteConfirmation {
    /// Key that was removed.
    pub key: String,
    /// Always `true`; present for wire compatibility.
    pub deleted: bool,
}

/// Row filter for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFilter {
    /// Every entry.
    #[default]
    All,
    /// Only entries with `is_public = true`.
    PublicOnly,
}

impl ConfigFilter {
    /// Filter matching the `public_only` flag.
    #[must_use]
    pub const fn from_public_only(public_only: bool) -> Self {
        if public_only {
            Self::PublicOnly
        } else {
            Self::All
        }
    }

    /// Whether rows must be public.
    #[must_use]
    pub const fn public_only(self) -> bool {
        matches!(self, Self::PublicOnly)
    }
}

/// Persisted configuration row with its raw textual value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    /// Surrogate key; listings follow its order.
    pub id: i64,
    /// Unique key.
    pub key: String,
    /// Raw stored text, `None` for SQL `NULL`.
    pub value: Option<String>,
    /// Declared type.
    pub value_type: ConfigType,
    /// Optional description.
    pub description: Option<String>,
    /// Visibility flag.
    pub is_public: bool,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StoredConfig {
    /// Decode the raw value according to the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Decode`] when the stored text does not match
    /// the type.
    pub fn parsed_value(&self) -> ConfigResult<Value> {
        decode_value(&self.key, self.value.as_deref(), self.value_type)
    }

    /// Convert into the decoded entry handed to callers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Decode`] when the stored text does not match
    /// the type.
    pub fn into_entry(self) -> ConfigResult<ConfigEntry> {
        let value = self.parsed_value()?;
        Ok(ConfigEntry {
            key: self.key,
            value,
            value_type: self.value_type,
            description: self.description,
            is_public: self.is_public,
        })
    }
}

impl TryFrom<ConfigRow> for StoredConfig {
    type Error = ConfigError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            value_type: row.value_type.parse()?,
            key: row.key,
            value: row.value,
            description: row.description,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insert payload for a new entry; `value` is already serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConfig {
    /// Unique key.
    pub key: String,
    /// Serialized value, `None` for SQL `NULL`.
    pub value: Option<String>,
    /// Declared type.
    pub value_type: ConfigType,
    /// Optional description.
    pub description: Option<String>,
    /// Visibility flag.
    pub is_public: bool,
}

/// Partial update for a stored entry; `value` is already serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    /// Replacement value (`Some(None)` writes `NULL`).
    pub value: Option<Option<String>>,
    /// Replacement type.
    pub value_type: Option<ConfigType>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement visibility flag.
    pub is_public: Option<bool>,
}

impl ConfigPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.value_type.is_none()
            && self.description.is_none()
            && self.is_public.is_none()
    }
}
