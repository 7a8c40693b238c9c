//! Priority playback queue and the player that drains it.
//!
//! Items are ordered by `(priority, sequence)`: more urgent first, then the
//! older request first within a priority.

mod command;
mod player;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::time::Duration;

use anchorcast_core::Priority;
use parking_lot::{Condvar, Mutex};

pub use command::CommandPlayer;
pub use player::{NowPlayingCallback, Player};

/// One playable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    pub priority: Priority,
    /// Request id; local sound effects draw from the same counter.
    pub sequence: u64,
    pub path: PathBuf,
    pub text: String,
    /// Pre-recorded sound effect, never deleted after playing.
    pub is_asset: bool,
}

impl PlaybackItem {
    fn key(&self) -> (Priority, u64) {
        (self.priority, self.sequence)
    }

    /// Remove the temporary file behind this item, leaving assets alone.
    pub fn discard_artifact(&self) {
        if self.is_asset {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete played audio");
            }
        }
    }
}

// BinaryHeap is a max-heap; invert so the smallest key pops first.
impl Ord for PlaybackItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for PlaybackItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Mutex + condvar priority heap shared by the listener and the player.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    heap: Mutex<BinaryHeap<PlaybackItem>>,
    available: Condvar,
}

impl PlaybackQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: PlaybackItem) {
        self.heap.lock().push(item);
        self.available.notify_one();
    }

    /// Pop the most urgent item, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<PlaybackItem> {
        let mut heap = self.heap.lock();
        if heap.is_empty() {
            let _ = self.available.wait_for(&mut heap, timeout);
        }
        heap.pop()
    }

    /// Remove everything still waiting.
    pub fn drain(&self) -> Vec<PlaybackItem> {
        self.heap.lock().drain().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Wake a waiting player without pushing anything.
    pub fn notify(&self) {
        self.available.notify_all();
    }
}
