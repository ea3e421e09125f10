//! Argument parsing, bootstrap, and command dispatch.

use std::env;
use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use quill_config::ConfigType;
use quill_telemetry::{LogFormat, LoggingConfig, init_logging};
use tracing::debug;

use crate::commands::cache::handle_cache_clear;
use crate::commands::config::{
    handle_config_bulk, handle_config_delete, handle_config_get, handle_config_list,
    handle_config_set,
};
use crate::commands::site::{handle_site_about, handle_site_seo, handle_site_show};
use crate::context::{AppContext, CliError, CliResult, Settings, parse_config_type};

const ENVIRONMENT_ENV: &str = "QUILL_ENV";
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_CLI_LOG_LEVEL: &str = "warn";
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Parses CLI arguments, executes the requested command, and prints its
/// output. Returns the process exit code.
pub async fn run() -> i32 {
    load_env_files();
    let cli = Cli::parse();

    if let Err(err) = init_cli_logging(&cli) {
        eprintln!("error: {}", err.display_message());
        return err.exit_code();
    }

    match execute(cli).await {
        Ok(rendered) => {
            if !rendered.is_empty() {
                println!("{rendered}");
            }
            0
        }
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn load_env_files() {
    let environment =
        env::var(ENVIRONMENT_ENV).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
    // dotenvy never overrides variables that are already set, so the
    // environment-specific file wins over `.env`.
    for file in [format!(".env.{environment}"), ".env".to_string()] {
        match dotenvy::from_filename(&file) {
            Ok(_) => {}
            Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => eprintln!("warning: failed to load {file}: {err}"),
        }
    }
}

fn init_cli_logging(cli: &Cli) -> CliResult<()> {
    let config = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        ..LoggingConfig::default()
    };
    init_logging(&config).map_err(CliError::failure)
}

async fn execute(cli: Cli) -> CliResult<String> {
    let settings = Settings::from_cli(&cli)?;
    let ctx = AppContext::connect(&settings, cli.output).await?;
    debug!(command = command_label(&cli.command), "dispatching command");
    let result = dispatch(cli.command, &ctx).await;
    if cli.metrics {
        match ctx.metrics_report() {
            Ok(report) => eprint!("{report}"),
            Err(err) => eprintln!("warning: {}", err.display_message()),
        }
    }
    result
}

pub(crate) async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<String> {
    match command {
        Command::Config(config) => match config {
            ConfigCommand::Get(args) => handle_config_get(ctx, &args.key).await,
            ConfigCommand::List(args) => handle_config_list(ctx, args.public).await,
            ConfigCommand::Set(args) => handle_config_set(ctx, args).await,
            ConfigCommand::Bulk(args) => handle_config_bulk(ctx, &args.file).await,
            ConfigCommand::Delete(args) => handle_config_delete(ctx, &args.key).await,
        },
        Command::Cache(CacheCommand::Clear(args)) => {
            handle_cache_clear(ctx, args.key.as_deref()).await
        }
        Command::Site(site) => match site {
            SiteCommand::Show => handle_site_show(ctx).await,
            SiteCommand::Seo => handle_site_seo(ctx).await,
            SiteCommand::About => handle_site_about(ctx).await,
        },
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Config(ConfigCommand::Get(_)) => "config_get",
        Command::Config(ConfigCommand::List(_)) => "config_list",
        Command::Config(ConfigCommand::Set(_)) => "config_set",
        Command::Config(ConfigCommand::Bulk(_)) => "config_bulk",
        Command::Config(ConfigCommand::Delete(_)) => "config_delete",
        Command::Cache(CacheCommand::Clear(_)) => "cache_clear",
        Command::Site(SiteCommand::Show) => "site_show",
        Command::Site(SiteCommand::Seo) => "site_seo",
        Command::Site(SiteCommand::About) => "site_about",
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    raw.parse::<LogFormat>()
        .map_err(|_| format!("unknown log format {raw:?}; expected json, pretty or auto"))
}

#[derive(Parser)]
#[command(name = "quill", about = "Administrative CLI for Quill site configuration")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "QUILL_DATABASE_URL",
        help = "PostgreSQL connection string (falls back to DATABASE_URL)"
    )]
    pub(crate) database_url: Option<String>,
    #[arg(
        long,
        global = true,
        env = "QUILL_REDIS_URL",
        help = "Redis URL for the shared cache; omit to cache in-process"
    )]
    pub(crate) redis_url: Option<String>,
    #[arg(
        long,
        global = true,
        env = "QUILL_CACHE_TTL_SECS",
        default_value_t = DEFAULT_CACHE_TTL_SECS
    )]
    pub(crate) cache_ttl_secs: u64,
    #[arg(
        long,
        global = true,
        env = "QUILL_LOG_LEVEL",
        default_value = DEFAULT_CLI_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "QUILL_LOG_FORMAT",
        value_parser = parse_log_format
    )]
    pub(crate) log_format: Option<LogFormat>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        help = "Print the run's Prometheus metrics to stderr after the command"
    )]
    pub(crate) metrics: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Read and write configuration entries.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage cached configuration.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Show the public site projections.
    #[command(subcommand)]
    Site(SiteCommand),
}

#[derive(Debug, Subcommand)]
pub(crate) enum ConfigCommand {
    /// Show one entry.
    Get(ConfigKeyArgs),
    /// List entries in store order.
    List(ConfigListArgs),
    /// Create or partially update one entry.
    Set(ConfigSetArgs),
    /// Apply a JSON array of updates in order, stopping at the first failure.
    Bulk(ConfigBulkArgs),
    /// Remove one entry.
    Delete(ConfigKeyArgs),
}

#[derive(Debug, Subcommand)]
pub(crate) enum CacheCommand {
    /// Drop cached entries; the list aggregates are always dropped.
    Clear(CacheClearArgs),
}

#[derive(Debug, Subcommand)]
pub(crate) enum SiteCommand {
    /// Site identity: name, description, logo, URL, footer, social links.
    Show,
    /// Default SEO metadata.
    Seo,
    /// About-page profile merged with defaults.
    About,
}

#[derive(Debug, Args)]
pub(crate) struct ConfigKeyArgs {
    #[arg(help = "Configuration key")]
    pub(crate) key: String,
}

#[derive(Debug, Args)]
pub(crate) struct ConfigListArgs {
    #[arg(long, help = "Only list entries visible to anonymous readers")]
    pub(crate) public: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ConfigSetArgs {
    #[arg(help = "Configuration key")]
    pub(crate) key: String,
    #[arg(long, help = "New value; parsed as JSON when possible, otherwise text")]
    pub(crate) value: Option<String>,
    #[arg(long = "type", value_parser = parse_config_type)]
    pub(crate) value_type: Option<ConfigType>,
    #[arg(long)]
    pub(crate) description: Option<String>,
    #[arg(long, conflicts_with = "private")]
    pub(crate) public: bool,
    #[arg(long)]
    pub(crate) private: bool,
}

impl ConfigSetArgs {
    pub(crate) const fn visibility(&self) -> Option<bool> {
        match (self.public, self.private) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct ConfigBulkArgs {
    #[arg(short = 'f', long = "file", help = "JSON array of {key, value?, type?, ...} items")]
    pub(crate) file: PathBuf,
}

#[derive(Debug, Args)]
pub(crate) struct CacheClearArgs {
    #[arg(long, help = "Also drop the cached entry for this key")]
    pub(crate) key: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
