use std::path::Path;

use anyhow::Context;
use quill_config::{BulkConfigItem, ConfigUpdate};

use crate::cli::ConfigSetArgs;
use crate::context::{AppContext, CliError, CliResult, parse_value_arg};
use crate::output::{render_deleted, render_entries, render_entry};

pub(crate) async fn handle_config_get(ctx: &AppContext, key: &str) -> CliResult<String> {
    let entry = ctx
        .facade()
        .get_config(key)
        .await?
        .ok_or_else(|| CliError::validation(format!("configuration {key} not found")))?;
    render_entry(&entry, ctx.output)
}

pub(crate) async fn handle_config_list(ctx: &AppContext, public_only: bool) -> CliResult<String> {
    let entries = ctx.facade().get_all_configs(public_only).await?;
    render_entries(&entries, ctx.output)
}

pub(crate) async fn handle_config_set(ctx: &AppContext, args: ConfigSetArgs) -> CliResult<String> {
    let is_public = args.visibility();
    let update = ConfigUpdate {
        value: args.value.as_deref().map(parse_value_arg),
        value_type: args.value_type,
        description: args.description,
        is_public,
    };
    let entry = ctx.facade().update_config(&args.key, update).await?;
    render_entry(&entry, ctx.output)
}

pub(crate) async fn handle_config_bulk(ctx: &AppContext, file: &Path) -> CliResult<String> {
    let payload = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))
        .map_err(CliError::failure)?;

    let items: Vec<BulkConfigItem> = serde_json::from_str(&payload).map_err(|err| {
        CliError::validation(format!(
            "{} is not a JSON array of configuration items: {err}",
            file.display()
        ))
    })?;

    let entries = ctx.facade().bulk_update_configs(items).await?;
    render_entries(&entries, ctx.output)
}

pub(crate) async fn handle_config_delete(ctx: &AppContext, key: &str) -> CliResult<String> {
    let confirmation = ctx.facade().delete_config(key).await?;
    render_deleted(&confirmation, ctx.output)
}
