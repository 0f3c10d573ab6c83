//! Argument parsing and command dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tankobon_client::EntityId;
use tankobon_config::{ClientConfig, parse_api_url};
use tankobon_telemetry::{LogFormat, LoggingConfig, init_logging};
use url::Url;

use crate::client::{AppContext, CliError, CliResult, StderrNotifier, spawn_backend_notice};
use crate::commands::series::{
    handle_add, handle_complete, handle_list, handle_metadata, handle_own, handle_remove,
    handle_update,
};
use crate::commands::session::{handle_login, handle_logout, handle_whoami};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let logging = LoggingConfig {
        level: &config.logging.level,
        format: LogFormat::from_setting(config.logging.format),
        build_sha: option_env!("TANKOBON_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    match dispatch(cli, &config).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

/// Environment configuration with command-line overrides applied.
pub(crate) fn resolve_config(cli: &Cli) -> CliResult<ClientConfig> {
    let mut config =
        ClientConfig::from_env().map_err(|err| CliError::validation(err.to_string()))?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir.clone_from(data_dir);
    }
    if let Some(timeout) = cli.timeout {
        config.http_timeout = Duration::from_secs(timeout);
    }
    Ok(config)
}

async fn dispatch(cli: Cli, config: &ClientConfig) -> CliResult<()> {
    let ctx = AppContext::build(config, Arc::new(StderrNotifier))?;
    let notice = spawn_backend_notice(&ctx.backend);
    let result = execute(&ctx, cli.command, cli.output).await;
    notice.abort();
    result
}

pub(crate) async fn execute(
    ctx: &AppContext,
    command: Command,
    format: OutputFormat,
) -> CliResult<()> {
    match command {
        Command::Login(args) => handle_login(ctx, args),
        Command::Logout => handle_logout(ctx),
        Command::Whoami => handle_whoami(ctx, format),
        Command::Ls => handle_list(ctx, format).await,
        Command::Add(args) => handle_add(ctx, args, format).await,
        Command::Complete(args) => handle_complete(ctx, args, format).await,
        Command::Own(args) => handle_own(ctx, args, format).await,
        Command::Update(args) => handle_update(ctx, args, format).await,
        Command::Rm(args) => handle_remove(ctx, args).await,
        Command::Metadata(args) => handle_metadata(ctx, args, format).await,
    }
}

fn parse_url(input: &str) -> Result<Url, String> {
    parse_api_url("--api-url", input).map_err(|err| err.to_string())
}

#[derive(Parser)]
#[command(name = "tankobon", about = "Track a manga collection from the terminal")]
pub(crate) struct Cli {
    #[arg(long, global = true, value_parser = parse_url, help = "Collection service base URL")]
    pub(crate) api_url: Option<Url>,
    #[arg(long, global = true, help = "Directory holding the stored session")]
    pub(crate) data_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "HTTP timeout in seconds"
    )]
    pub(crate) timeout: Option<u64>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Store a bearer token for later commands.
    Login(LoginArgs),
    /// Forget the stored token.
    Logout,
    /// Show who the stored token belongs to.
    Whoami,
    /// List the collection.
    Ls,
    /// Add a series.
    Add(AddArgs),
    /// Toggle whether a series is complete.
    Complete(SeriesIdArgs),
    /// Toggle ownership of a single volume.
    Own(VolumeIdArgs),
    /// Change fields of a series.
    Update(UpdateArgs),
    /// Delete a series.
    Rm(SeriesIdArgs),
    /// Look up external metadata (throttled).
    Metadata(MetadataArgs),
}

#[derive(Args)]
pub(crate) struct LoginArgs {
    #[arg(long, help = "Token issued by the collection service")]
    pub(crate) token: String,
}

#[derive(Args)]
pub(crate) struct AddArgs {
    #[arg(help = "Series title")]
    pub(crate) title: String,
    #[arg(long, help = "Number of published volumes")]
    pub(crate) volumes: u32,
    #[arg(long)]
    pub(crate) score: Option<f64>,
    #[arg(long, value_delimiter = ',')]
    pub(crate) tags: Vec<String>,
}

#[derive(Args)]
pub(crate) struct SeriesIdArgs {
    #[arg(help = "Series identifier")]
    pub(crate) id: EntityId,
}

#[derive(Args)]
pub(crate) struct VolumeIdArgs {
    #[arg(help = "Volume identifier")]
    pub(crate) volume_id: EntityId,
}

#[derive(Args)]
pub(crate) struct UpdateArgs {
    #[arg(help = "Series identifier")]
    pub(crate) id: EntityId,
    #[arg(long)]
    pub(crate) title: Option<String>,
    #[arg(long)]
    pub(crate) volumes: Option<u32>,
    #[arg(long)]
    pub(crate) score: Option<f64>,
    #[arg(long, value_delimiter = ',')]
    pub(crate) tags: Option<Vec<String>>,
}

#[derive(Args)]
pub(crate) struct MetadataArgs {
    #[arg(required = true, help = "External catalogue identifiers")]
    pub(crate) ids: Vec<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
