//! Portal Sync CLI
//!
//! Operator tool for inspecting and driving the portal's local-first cache:
//! list resources, read and write values, run hydration and check status.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use portal_sync_core::{Config, SyncContext};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "portal-sync")]
#[command(about = "Inspect and drive the portal's local-first data cache")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every resource with its local and remote keys
    Keys,
    /// Print the locally cached value of a resource
    Get {
        /// Resource name (e.g. classes, results, results@u1)
        resource: String,
        /// User for private resources
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Write a JSON value through the caches and to the remote store
    Set {
        /// Resource name (e.g. classes, bookmarks@u1)
        resource: String,
        /// JSON value
        value: String,
        /// User for private resources
        #[arg(short, long)]
        user: Option<String>,
        /// Fail if the remote store does not accept the write
        #[arg(long)]
        wait: bool,
    },
    /// Pull remote values into the local caches
    Hydrate {
        /// Also hydrate this user's private resources
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Show configuration, cache availability and cached keys
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, remote_url, remote_enabled,
        /// remote_timeout_secs, persistent_cache)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Commands that don't need a sync context
    match &cli.command {
        Commands::Keys => return commands::keys::list(&output),
        Commands::Config { command } => {
            return handle_config_command(command.clone(), config_path, &output);
        }
        _ => {}
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    debug!(data_dir = %config.data_dir.display(), "Configuration loaded");
    let ctx = SyncContext::open(&config);

    match cli.command {
        Commands::Get { resource, user } => commands::get::get(&ctx, &resource, user, &output),
        Commands::Set {
            resource,
            value,
            user,
            wait,
        } => commands::set::set(&ctx, &resource, &value, user, wait, &output).await,
        Commands::Hydrate { user } => commands::hydrate::hydrate(&ctx, user, &output).await,
        Commands::Status => commands::status::show(&ctx, &config, &output),
        // Handled above
        Commands::Keys | Commands::Config { .. } => Ok(()),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log to stderr so stdout stays clean for values and JSON
///
/// `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "portal_sync_core={},portal_sync_cli={}",
            log_level, log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
