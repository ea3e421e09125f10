//! In-memory [`ConfigFacade`] for exercising command handlers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quill_config::{
    BulkConfigItem, ConfigEntry, ConfigError, ConfigFacade, ConfigResult, ConfigType,
    ConfigUpdate, DeleteConfirmation,
};
use quill_telemetry::Metrics;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::context::AppContext;

#[derive(Default)]
pub(crate) struct FakeFacade {
    entries: Mutex<Vec<ConfigEntry>>,
    cleared: Mutex<Vec<Option<String>>>,
}

impl FakeFacade {
    pub(crate) fn with_entries(entries: Vec<ConfigEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            cleared: Mutex::default(),
        })
    }

    pub(crate) fn context(self: &Arc<Self>, output: OutputFormat) -> AppContext {
        AppContext {
            facade: Arc::clone(self) as Arc<dyn ConfigFacade>,
            metrics: Metrics::new().expect("metrics registry"),
            output,
        }
    }

    pub(crate) fn entry(&self, key: &str) -> Option<ConfigEntry> {
        self.entries
            .lock()
            .expect("entries lock")
            .iter()
            .find(|entry| entry.key == key)
            .cloned()
    }

    pub(crate) fn cleared(&self) -> Vec<Option<String>> {
        self.cleared.lock().expect("cleared lock").clone()
    }

    fn apply(&self, key: &str, update: ConfigUpdate) -> ConfigResult<ConfigEntry> {
        if key.trim().is_empty() {
            return Err(ConfigError::InvalidKey {
                key: key.to_string(),
            });
        }
        let mut entries = self.entries.lock().expect("entries lock");
        let position = entries.iter().position(|entry| entry.key == key);
        let current = position.map(|index| entries[index].clone());
        let value_type = update
            .value_type
            .or_else(|| current.as_ref().map(|entry| entry.value_type))
            .unwrap_or_default();
        let value = update
            .value
            .or_else(|| current.as_ref().map(|entry| entry.value.clone()))
            .unwrap_or(Value::Null);
        if value_type == ConfigType::Number && !(value.is_number() || value.is_null()) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value_type,
                reason: "not a number",
            });
        }
        let entry = ConfigEntry {
            key: key.to_string(),
            value,
            value_type,
            description: update
                .description
                .or_else(|| current.as_ref().and_then(|entry| entry.description.clone())),
            is_public: update
                .is_public
                .or_else(|| current.as_ref().map(|entry| entry.is_public))
                .unwrap_or(false),
        };
        match position {
            Some(index) => entries[index] = entry.clone(),
            None => entries.push(entry.clone()),
        }
        Ok(entry)
    }
}

#[async_trait]
impl ConfigFacade for FakeFacade {
    async fn get_config(&self, key: &str) -> ConfigResult<Option<ConfigEntry>> {
        Ok(self.entry(key))
    }

    async fn get_all_configs(&self, public_only: bool) -> ConfigResult<Vec<ConfigEntry>> {
        Ok(self
            .entries
            .lock()
            .expect("entries lock")
            .iter()
            .filter(|entry| !public_only || entry.is_public)
            .cloned()
            .collect())
    }

    async fn update_config(&self, key: &str, update: ConfigUpdate) -> ConfigResult<ConfigEntry> {
        self.apply(key, update)
    }

    async fn bulk_update_configs(
        &self,
        items: Vec<BulkConfigItem>,
    ) -> ConfigResult<Vec<ConfigEntry>> {
        let mut committed = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match self.apply(&item.key, item.update) {
                Ok(entry) => committed.push(entry),
                Err(source) => {
                    return Err(ConfigError::BulkUpdate {
                        index,
                        key: item.key,
                        committed,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(committed)
    }

    async fn delete_config(&self, key: &str) -> ConfigResult<DeleteConfirmation> {
        let mut entries = self.entries.lock().expect("entries lock");
        let before = entries.len();
        entries.retain(|entry| entry.key != key);
        if entries.len() == before {
            return Err(ConfigError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(DeleteConfirmation {
            key: key.to_string(),
            deleted: true,
        })
    }

    async fn clear_config_cache(&self, key: Option<&str>) {
        self.cleared
            .lock()
            .expect("cleared lock")
            .push(key.map(str::to_string));
    }
}

pub(crate) fn entry(key: &str, value: Value, value_type: ConfigType, is_public: bool) -> ConfigEntry {
    ConfigEntry {
        key: key.to_string(),
        value,
        value_type,
        description: None,
        is_public,
    }
}
