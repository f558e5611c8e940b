//! PortFinder CLI - Locate the port a server is listening on
//!
//! A command-line tool for probing a port range and managing the stored
//! discovery settings.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portfinder_core::SettingsStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::Overrides;

#[derive(Parser)]
#[command(name = "portfinder")]
#[command(author, version, about = "Locate the port a server is listening on")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file [default: ~/.portfinder/config.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a port range and print the first port that answers
    Find {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Manage stored settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective settings
    Show,
    /// Store settings used by later runs
    Set {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Initialize logging to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = match cli.config {
        Some(path) => SettingsStore::with_path(path),
        None => SettingsStore::new()?,
    };

    match cli.command {
        Commands::Find { overrides } => {
            commands::find::run(&store, overrides, cli.json).await?;
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config::show(&store, cli.json).await?,
            ConfigAction::Set { overrides } => commands::config::set(&store, overrides).await?,
        },
    }

    Ok(())
}
