//! Output renderers and formatting helpers for CLI commands.
//!
//! Renderers return the text to print so handlers stay testable.

use anyhow::anyhow;
use quill_config::{ConfigEntry, DeleteConfirmation, SeoSettings, SiteSettings};
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::context::{CliError, CliResult};

const UNSET: &str = "<unset>";

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

/// Strings print bare; everything else prints as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => UNSET.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn render_pairs(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(label, value)| format!("{label:<20} {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn render_entry(entry: &ConfigEntry, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(entry),
        OutputFormat::Table => Ok(render_pairs(&[
            ("key", entry.key.clone()),
            ("type", entry.value_type.to_string()),
            ("public", entry.is_public.to_string()),
            (
                "description",
                entry.description.clone().unwrap_or_else(|| UNSET.to_string()),
            ),
            ("value", display_value(&entry.value)),
        ])),
    }
}

pub(crate) fn render_entries(entries: &[ConfigEntry], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(entries),
        OutputFormat::Table => {
            let mut lines = vec![format!("{:<28} {:<8} {:<6} VALUE", "KEY", "TYPE", "PUBLIC")];
            lines.extend(entries.iter().map(|entry| {
                format!(
                    "{:<28} {:<8} {:<6} {}",
                    entry.key,
                    entry.value_type.as_str(),
                    if entry.is_public { "yes" } else { "no" },
                    display_value(&entry.value)
                )
            }));
            Ok(lines.join("\n"))
        }
    }
}

pub(crate) fn render_deleted(
    confirmation: &DeleteConfirmation,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(confirmation),
        OutputFormat::Table => Ok(format!("deleted {}", confirmation.key)),
    }
}

pub(crate) fn render_cache_cleared(keys: &[String], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&json!({ "cleared": keys })),
        OutputFormat::Table => Ok(format!("cleared cache keys: {}", keys.join(", "))),
    }
}

pub(crate) fn render_site(settings: &SiteSettings, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(settings),
        OutputFormat::Table => Ok(render_pairs(&[
            ("siteName", settings.site_name.clone()),
            ("siteDescription", settings.site_description.clone()),
            ("siteLogo", settings.site_logo.clone()),
            ("siteUrl", settings.site_url.clone()),
            ("footerText", settings.footer_text.clone()),
            ("socialLinks", settings.social_links.to_string()),
        ])),
    }
}

pub(crate) fn render_seo(settings: &SeoSettings, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(settings),
        OutputFormat::Table => Ok(render_pairs(&[
            ("defaultTitle", settings.default_title.clone()),
            ("defaultDescription", settings.default_description.clone()),
            ("defaultKeywords", settings.default_keywords.join(", ")),
            ("ogImage", settings.og_image.clone()),
        ])),
    }
}

/// The profile is a nested document, so both formats print JSON.
pub(crate) fn render_about(profile: &Value, _format: OutputFormat) -> CliResult<String> {
    to_json(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_config::ConfigType;

    fn entry(key: &str, value: Value, value_type: ConfigType, is_public: bool) -> ConfigEntry {
        ConfigEntry {
            key: key.to_string(),
            value,
            value_type,
            description: None,
            is_public,
        }
    }

    #[test]
    fn table_lists_one_row_per_entry() {
        let entries = vec![
            entry("site_name", Value::from("My Blog"), ConfigType::String, true),
            entry("posts_per_page", Value::from(10), ConfigType::Number, false),
            entry("site_logo", Value::Null, ConfigType::String, true),
        ];
        let rendered = render_entries(&entries, OutputFormat::Table).expect("render");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("KEY"));
        assert!(lines[1].starts_with("site_name") && lines[1].ends_with("My Blog"));
        assert!(lines[2].contains("number") && lines[2].ends_with("10"));
        assert!(lines[3].ends_with(UNSET));
    }

    #[test]
    fn json_output_round_trips_entries() {
        let entries = vec![entry(
            "site_social",
            json!({"twitter": "@quill"}),
            ConfigType::Json,
            true,
        )];
        let rendered = render_entries(&entries, OutputFormat::Json).expect("render");
        let parsed: Vec<ConfigEntry> = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(parsed, entries);
    }

    #[test]
    fn single_entry_table_shows_compact_json_values() {
        let rendered = render_entry(
            &entry("site_social", json!({"x": 1}), ConfigType::Json, true),
            OutputFormat::Table,
        )
        .expect("render");
        assert!(rendered.contains(r#"{"x":1}"#));
        assert!(rendered.contains("description          <unset>"));
    }

    #[test]
    fn seo_table_joins_keywords() {
        let settings = SeoSettings {
            default_title: "Quill".into(),
            default_description: String::new(),
            default_keywords: vec!["rust".into(), "blog".into()],
            og_image: String::new(),
        };
        let rendered = render_seo(&settings, OutputFormat::Table).expect("render");
        assert!(rendered.contains("rust, blog"));
    }
}
