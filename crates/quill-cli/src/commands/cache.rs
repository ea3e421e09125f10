use quill_config::{ALL_CONFIGS_CACHE_KEY, PUBLIC_CONFIGS_CACHE_KEY, entry_cache_key};

use crate::context::{AppContext, CliResult};
use crate::output::render_cache_cleared;

/// Clearing is best-effort; individual delete failures are logged by the
/// service and do not fail the command.
pub(crate) async fn handle_cache_clear(ctx: &AppContext, key: Option<&str>) -> CliResult<String> {
    ctx.facade().clear_config_cache(key).await;

    let mut keys: Vec<String> = key.map(entry_cache_key).into_iter().collect();
    keys.push(ALL_CONFIGS_CACHE_KEY.to_string());
    keys.push(PUBLIC_CONFIGS_CACHE_KEY.to_string());
    render_cache_cleared(&keys, ctx.output)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::cli::OutputFormat;
    use crate::fakes::FakeFacade;

    #[tokio::test]
    async fn clear_without_key_drops_only_aggregates() {
        let facade = FakeFacade::with_entries(Vec::new());
        let ctx = facade.context(OutputFormat::Table);
        let rendered = handle_cache_clear(&ctx, None).await.expect("clear");
        assert_eq!(rendered, "cleared cache keys: config:all, config:all:public");
        assert_eq!(facade.cleared(), vec![None]);
    }

    #[tokio::test]
    async fn clear_with_key_includes_entry() {
        let facade = FakeFacade::with_entries(Vec::new());
        let ctx = facade.context(OutputFormat::Json);
        let rendered = handle_cache_clear(&ctx, Some("site_name"))
            .await
            .expect("clear");
        let parsed: Value = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(
            parsed,
            json!({"cleared": ["config:site_name", "config:all", "config:all:public"]})
        );
        assert_eq!(facade.cleared(), vec![Some("site_name".to_string())]);
    }
}
