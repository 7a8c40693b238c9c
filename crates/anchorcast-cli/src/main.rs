//! `anchorcast` entry point.

use std::time::Duration;

use clap::Parser;

use anchorcast_cli::{Cli, Commands, handlers, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Serve { config } => handlers::serve::execute(config).await?,
        Commands::Speak {
            config,
            lines,
            drain_timeout,
        } => {
            handlers::speak::execute(config, lines, Duration::from_secs(drain_timeout)).await?;
        }
    }

    Ok(())
}
