//! Public site projections assembled from individual configuration entries.
//!
//! Missing entries degrade to empty values; store and decode failures still
//! propagate.

use serde::{Deserialize, Serialize};
use serde_json::map::Entry;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::defaults::{ABOUT_PROFILE_KEY, default_about_profile};
use crate::error::ConfigResult;
use crate::model::ConfigEntry;
use crate::service::ConfigFacade;

/// General site branding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    /// `site_name`.
    pub site_name: String,
    /// `site_description`.
    pub site_description: String,
    /// `site_logo`.
    pub site_logo: String,
    /// `site_url`.
    pub site_url: String,
    /// `site_footer`.
    pub footer_text: String,
    /// `site_social`, `{}` when unset.
    pub social_links: Value,
}

/// Search-engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoSettings {
    /// `seo_title`.
    pub default_title: String,
    /// `seo_description`.
    pub default_description: String,
    /// `seo_keywords`, from an array or a comma-separated string.
    pub default_keywords: Vec<String>,
    /// `seo_og_image`.
    pub og_image: String,
}

/// Read the site branding entries concurrently.
///
/// # Errors
///
/// Propagates the first store, cache or decode failure.
#[instrument(name = "site.settings", skip(facade))]
pub async fn site_settings(facade: &dyn ConfigFacade) -> ConfigResult<SiteSettings> {
    let (name, description, footer, logo, url, social) = tokio::try_join!(
        facade.get_config("site_name"),
        facade.get_config("site_description"),
        facade.get_config("site_footer"),
        facade.get_config("site_logo"),
        facade.get_config("site_url"),
        facade.get_config("site_social"),
    )?;

    Ok(SiteSettings {
        site_name: text_or_empty(name),
        site_description: text_or_empty(description),
        site_logo: text_or_empty(logo),
        site_url: text_or_empty(url),
        footer_text: text_or_empty(footer),
        social_links: value_or(social, || Value::Object(Map::new())),
    })
}

/// Read the SEO entries concurrently.
///
/// # Errors
///
/// Propagates the first store, cache or decode failure.
#[instrument(name = "site.seo", skip(facade))]
pub async fn seo_settings(facade: &dyn ConfigFacade) -> ConfigResult<SeoSettings> {
    let (title, description, keywords, og_image) = tokio::try_join!(
        facade.get_config("seo_title"),
        facade.get_config("seo_description"),
        facade.get_config("seo_keywords"),
        facade.get_config("seo_og_image"),
    )?;

    Ok(SeoSettings {
        default_title: text_or_empty(title),
        default_description: text_or_empty(description),
        default_keywords: keywords.map_or_else(Vec::new, |entry| split_keywords(&entry.value)),
        og_image: text_or_empty(og_image),
    })
}

/// Read the about-page profile, filling absent fields from the default.
///
/// # Errors
///
/// Propagates store, cache or decode failures.
#[instrument(name = "site.about", skip(facade))]
pub async fn about_profile(facade: &dyn ConfigFacade) -> ConfigResult<Value> {
    let stored = facade.get_config(ABOUT_PROFILE_KEY).await?;
    let defaults = default_about_profile();
    Ok(match stored.map(|entry| entry.value) {
        Some(mut profile @ Value::Object(_)) => {
            merge_missing(&mut profile, &defaults);
            profile
        }
        _ => defaults,
    })
}

/// Fill fields of `defaults` that `target` lacks.
///
/// Nested objects are filled recursively; existing values, arrays included,
/// are never replaced. A non-object `target` becomes an object first.
pub fn merge_missing(target: &mut Value, defaults: &Value) {
    let Value::Object(default_fields) = defaults else {
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(fields) = target else {
        return;
    };
    for (name, default) in default_fields {
        match fields.entry(name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(default.clone());
            }
            Entry::Occupied(mut slot) => {
                if default.is_object() {
                    merge_missing(slot.get_mut(), default);
                }
            }
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn value_or(entry: Option<ConfigEntry>, fallback: impl FnOnce() -> Value) -> Value {
    entry
        .map(|entry| entry.value)
        .filter(|value| !is_falsy(value))
        .unwrap_or_else(fallback)
}

fn text_or_empty(entry: Option<ConfigEntry>) -> String {
    match value_or(entry, || Value::Null) {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn split_keywords(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
