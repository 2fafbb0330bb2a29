//! Sync command - Mirror a local directory into the workspace
//!
//! Provides the `wsync sync` CLI command which:
//! 1. Merges command-line arguments over the configuration file
//! 2. Creates the REST client from the host and the token environment variable
//! 3. Runs the SyncEngine once, continuously (`--watch`) or as a preview
//!    (`--dry-run`)
//! 4. Renders progress events as they arrive
//!
//! Ctrl-C cancels the session. Operations already sent finish first and the
//! interrupted cycle is not recorded, so the next run picks it up again.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wsync_core::config::Config;
use wsync_core::domain::{RemotePath, WorkspaceHost};
use wsync_remote::WorkspaceClient;
use wsync_sync::events::EventNotifier;
use wsync_sync::{Diff, SyncEngine, SyncError, SyncOptions};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Capacity of the channel between the engine and the event renderer
const EVENT_BUFFER: usize = 256;

/// Sync command with clap options
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local directory to synchronize [default: sync.root]
    pub local: Option<PathBuf>,

    /// Remote workspace directory, e.g. /Users/me@example.com/project
    /// [default: sync.remote_path]
    pub remote: Option<String>,

    /// Keep running and sync every change
    #[arg(long)]
    pub watch: bool,

    /// Forget what was synchronized before and upload everything
    #[arg(long)]
    pub full: bool,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Seconds between polls in watch mode [default: sync.poll_interval]
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Output format for progress events
    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Workspace URL [default: workspace.host]
    #[arg(long)]
    pub host: Option<String>,
}

impl SyncCommand {
    /// Applies the command-line overrides to `config` and validates the result
    ///
    /// Returns the remote directory and workspace host the session targets.
    fn resolve(&self, config: &mut Config) -> Result<(RemotePath, WorkspaceHost)> {
        if let Some(local) = &self.local {
            config.sync.root = local.clone();
        }
        if let Some(remote) = &self.remote {
            config.sync.remote_path = Some(remote.clone());
        }
        if let Some(interval) = self.interval {
            config.sync.poll_interval = interval;
        }
        if let Some(host) = &self.host {
            config.workspace.host = Some(host.clone());
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            bail!("Invalid configuration: {}", details.join("; "));
        }

        let Some(remote) = config.sync.remote_path.clone() else {
            bail!("No remote path given. Pass REMOTE or set sync.remote_path");
        };
        let Some(host) = config.workspace.host.as_deref() else {
            bail!("No workspace host given. Pass --host or set workspace.host");
        };

        let remote = RemotePath::new(remote).context("Invalid remote path")?;
        let host = WorkspaceHost::new(host).context("Invalid workspace host")?;
        Ok((remote, host))
    }

    /// Execute the sync command
    pub async fn execute(&self, mut config: Config, format: OutputFormat) -> Result<()> {
        let format = self.output.unwrap_or(format);
        let formatter: Arc<dyn OutputFormatter> = Arc::from(get_formatter(format));

        let (remote, host) = self.resolve(&mut config)?;
        let mut options = SyncOptions::from_config(&config, remote, host.as_str());
        options.full = self.full;

        let token_env = &config.workspace.token_env;
        let token = match std::env::var(token_env) {
            Ok(token) => token,
            // A preview never talks to the workspace
            Err(_) if self.dry_run => String::new(),
            Err(_) => bail!("No access token found. Set the {token_env} environment variable"),
        };
        let client = Arc::new(WorkspaceClient::new(&host, token).context("Failed to create workspace client")?);

        info!(
            local = %options.local_root.display(),
            remote = %options.remote_path,
            host = %host,
            watch = self.watch,
            full = self.full,
            "Starting sync"
        );

        if self.dry_run {
            let engine = SyncEngine::new(options, client);
            let diff = engine.dry_run().await.context("Failed to compute changes")?;
            render_diff(formatter.as_ref(), format, &diff);
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let renderer = {
            let formatter = Arc::clone(&formatter);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    formatter.event(&event);
                }
            })
        };

        let cancel = CancellationToken::new();
        spawn_ctrl_c_handler(cancel.clone());

        let engine = SyncEngine::new(options, client).with_events(EventNotifier::new(tx));
        let result = if self.watch {
            engine.run(&cancel).await
        } else {
            engine.run_once(&cancel).await.map(|_| ())
        };

        // The renderer stops once the engine's sender is gone
        drop(engine);
        if let Err(e) = renderer.await {
            warn!(error = %e, "Event renderer stopped abnormally");
        }

        match result {
            Ok(()) => Ok(()),
            Err(SyncError::Cancelled) => {
                formatter.warn("Sync cancelled");
                Ok(())
            }
            Err(e) => Err(e).context("Sync failed"),
        }
    }
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });
}

/// Prints the outcome of `--dry-run`
fn render_diff(formatter: &dyn OutputFormatter, format: OutputFormat, diff: &Diff) {
    if format == OutputFormat::Json {
        formatter.print_json(&diff_to_json(diff));
        return;
    }

    if diff.is_empty() {
        formatter.success("Already up to date");
        return;
    }
    formatter.success("Dry run, no changes made. Would:");
    for path in &diff.delete {
        formatter.info(&format!("delete  {path}"));
    }
    for dir in &diff.rmdir {
        formatter.info(&format!("rmdir   {dir}"));
    }
    for dir in &diff.mkdir {
        formatter.info(&format!("mkdir   {dir}"));
    }
    for path in &diff.put {
        let remote = diff.remote_name(path);
        if remote == path {
            formatter.info(&format!("put     {path}"));
        } else {
            formatter.info(&format!("put     {path} -> {remote}"));
        }
    }
}

fn diff_to_json(diff: &Diff) -> serde_json::Value {
    serde_json::json!({
        "dry_run": true,
        "put": diff.put,
        "delete": diff.delete,
        "mkdir": diff.mkdir,
        "rmdir": diff.rmdir,
    })
}
