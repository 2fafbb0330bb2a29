//! wsync CLI - Command-line interface for wsync
//!
//! Provides commands for:
//! - Synchronizing a local directory into a workspace, once or continuously
//! - Viewing and editing the configuration file
//! - Generating shell completions

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wsync_core::config::Config;

mod commands;
mod output;

use commands::{completions::CompletionsCommand, config::ConfigCommand, sync::SyncCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "wsync",
    version,
    about = "Mirror a local directory into a remote workspace"
)]
pub struct Cli {
    /// Output in JSON format (same as --output json)
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize a local directory into the workspace
    Sync(SyncCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Default log filter: `-v` flags win over the configured level
fn default_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Loads the configuration file, or the defaults if there is none
///
/// A file that exists but cannot be parsed is an error rather than being
/// silently replaced by defaults.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Runs `command`; only `sync` needs a configuration that parses
///
/// The `config` subcommands read the file themselves so they can report on
/// or repair a broken one.
async fn dispatch(command: Commands, config_path: &Path, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Sync(cmd) => {
            let config = load_config(config_path)?;
            cmd.execute(config, format).await
        }
        Commands::Config(cmd) => cmd.execute(config_path, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let configured_level = Config::load_or_default(&config_path).logging.level;

    // Logs go to stderr so the event stream on stdout stays parseable
    let filter = default_filter(cli.verbose, &configured_level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    dispatch(cli.command, &config_path, format).await
}
