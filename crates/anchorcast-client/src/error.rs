//! Client error types.

use std::path::PathBuf;

use anchorcast_core::{ConfigError, ConnectionFault, PoolClosed};

/// Errors surfaced by [`AnnouncerClient`](crate::AnnouncerClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background thread could not be started.
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The sender pool is gone.
    #[error(transparent)]
    PoolClosed(#[from] PoolClosed),

    #[error(transparent)]
    Connection(#[from] ConnectionFault),

    /// The client has been stopped.
    #[error("Client is stopped")]
    Stopped,
}
