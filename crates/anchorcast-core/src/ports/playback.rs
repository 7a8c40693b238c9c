//! Audio output port.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Playback of one artifact failed. The item still counts as done.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to start player for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("player exited with {status} for {path}")]
    Exit { path: PathBuf, status: String },

    #[error("playback I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Plays audio files, one at a time.
pub trait PlaybackSink: Send + Sync {
    /// Play `path` to completion. Returns early if [`stop`](Self::stop) is called.
    fn play(&self, path: &Path) -> Result<(), PlaybackError>;

    /// Force-stop whatever is currently playing. A no-op when idle.
    fn stop(&self);
}
