//! Config file resolution for both subcommands.

use std::path::Path;

use anchorcast_core::{ClientConfig, ServerConfig};
use anyhow::{Context, Result};

/// Load `path`, or fall back to defaults. Environment overrides apply either way.
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load client config {}", path.display())),
        None => {
            let mut config = ClientConfig::with_defaults();
            config
                .apply_env_overrides()
                .context("Invalid environment override")?;
            config.validate().context("Invalid client config")?;
            Ok(config)
        }
    }
}

/// Load `path`, or fall back to defaults. Environment overrides apply either way.
pub fn load_server_config(path: Option<&Path>) -> Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load server config {}", path.display())),
        None => {
            let mut config = ServerConfig::with_defaults();
            config.apply_env_overrides();
            config.validate().context("Invalid server config")?;
            Ok(config)
        }
    }
}
