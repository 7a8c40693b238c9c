//! Root CLI parser.

use clap::Parser;

use crate::commands::Commands;

/// Live-stream announcer: synthesis server and speaking client.
#[derive(Parser)]
#[command(name = "anchorcast")]
#[command(about = "Chunked TTS announcer for live streams")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
