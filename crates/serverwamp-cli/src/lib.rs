//! serverwamp command-line interface.

pub mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serverwamp_core::config::{Config, LoggingConfig};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// serverwamp - WAMP over WebSocket server
#[derive(Parser)]
#[command(name = "serverwamp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "SERVERWAMP_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the WAMP server with the demo application
    Serve(commands::serve::ServeArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Load the effective configuration.
///
/// An explicit path must exist; otherwise the default file is used when
/// present. A file that is present but unreadable is an error either way.
/// Environment overrides are applied last.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load_or_default().context("Failed to load default configuration")?,
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// Filter directive used when `RUST_LOG` is unset.
pub fn filter_directive(verbose: u8, logging: &LoggingConfig) -> String {
    match verbose {
        0 => format!("serverwamp={}", logging.level.to_lowercase()),
        1 => "serverwamp=debug,tower_http=debug".to_string(),
        _ => "serverwamp=trace,tower_http=trace".to_string(),
    }
}

/// Install the global tracing subscriber.
pub fn init_logging(verbose: u8, logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_directive(verbose, logging).into());

    let json = logging.json.then(|| tracing_subscriber::fmt::layer().json());
    let text = (!logging.json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => commands::serve::run(args, config).await,
        Commands::Config(args) => commands::config::run(args, config).await,
        Commands::Version => {
            println!("serverwamp {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
