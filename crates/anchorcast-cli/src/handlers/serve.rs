//! `anchorcast serve`.

use std::path::PathBuf;

use anchorcast_server::{Backends, RunningServer, SynthesisServer};
use anyhow::{Context, Result};

use crate::config::load_server_config;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let server = tokio::task::spawn_blocking(move || start(config_path))
        .await
        .context("Server startup task failed")??;

    println!("anchorcast server listening on {}", server.local_addr());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Ctrl+C received, shutting down");

    tokio::task::spawn_blocking(move || server.stop())
        .await
        .context("Server shutdown task failed")??;
    Ok(())
}

fn start(config_path: Option<PathBuf>) -> Result<RunningServer> {
    let config = load_server_config(config_path.as_deref())?;
    let backends = Backends::from_config(&config).context("Failed to set up synthesis backends")?;

    tracing::info!(
        endpoint = %config.synthesis.endpoint,
        assistant = config.assistant.is_some(),
        keywords = config.assistant_replies.len(),
        "Synthesis backends ready"
    );

    let server = SynthesisServer::bind(&config, backends)?.spawn()?;
    Ok(server)
}
