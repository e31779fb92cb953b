//! serverwamp CLI entry point.

use clap::Parser;
use serverwamp_cli::{init_logging, load_config, run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging);

    run(cli, config).await
}
