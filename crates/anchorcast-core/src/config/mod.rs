//! Configuration for the client and server.
//!
//! Both configs are JSON files whose fields all have defaults, so an empty
//! object is a valid config. After loading, a handful of `ANCHORCAST_*`
//! environment variables override individual fields, then the result is
//! validated.

mod client;
mod server;
mod sound;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use client::{ClientConfig, DEFAULT_SERVER_PORT, PlayerConfig};
pub use server::{ServerConfig, SynthesisConfig};
pub use sound::{SoundAction, WeightedSound, default_sound_library};

/// Environment variable overriding the client's server host.
pub const ENV_SERVER_HOST: &str = "ANCHORCAST_SERVER_HOST";
/// Environment variable overriding the client's server port.
pub const ENV_SERVER_PORT: &str = "ANCHORCAST_SERVER_PORT";
/// Environment variable overriding the server's bind address.
pub const ENV_BIND: &str = "ANCHORCAST_BIND";
/// Environment variable overriding the main synthesis endpoint.
pub const ENV_TTS_ENDPOINT: &str = "ANCHORCAST_TTS_ENDPOINT";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn require_positive(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be at least 1")));
    }
    Ok(())
}
