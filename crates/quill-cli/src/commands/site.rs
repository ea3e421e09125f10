use quill_config::{about_profile, seo_settings, site_settings};

use crate::context::{AppContext, CliResult};
use crate::output::{render_about, render_seo, render_site};

pub(crate) async fn handle_site_show(ctx: &AppContext) -> CliResult<String> {
    let settings = site_settings(ctx.facade()).await?;
    render_site(&settings, ctx.output)
}

pub(crate) async fn handle_site_seo(ctx: &AppContext) -> CliResult<String> {
    let settings = seo_settings(ctx.facade()).await?;
    render_seo(&settings, ctx.output)
}

pub(crate) async fn handle_site_about(ctx: &AppContext) -> CliResult<String> {
    let profile = about_profile(ctx.facade()).await?;
    render_about(&profile, ctx.output)
}
