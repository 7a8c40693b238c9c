//! Subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the synthesis server until Ctrl-C
    Serve {
        /// Server config file (JSON); defaults are used when omitted
        #[arg(short, long, env = "ANCHORCAST_SERVER_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Run an announcer client and speak script lines
    Speak {
        /// Client config file (JSON); defaults are used when omitted
        #[arg(short, long, env = "ANCHORCAST_CLIENT_CONFIG")]
        config: Option<PathBuf>,

        /// Lines to speak; read from stdin when none are given
        lines: Vec<String>,

        /// Seconds to wait for queued speech to finish before exiting
        #[arg(long, default_value_t = 300)]
        drain_timeout: u64,
    },
}
