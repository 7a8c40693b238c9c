//! The playback thread body.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anchorcast_core::PlaybackSink;
use parking_lot::Mutex;

use super::{PlaybackItem, PlaybackQueue};
use crate::cancel::CancellationWindow;
use crate::counters::PendingCounters;

/// Called with the display text right before an item starts playing.
pub type NowPlayingCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// How long one pop waits before re-checking the shutdown flag.
const POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Plays queued items one at a time through a [`PlaybackSink`].
pub struct Player {
    queue: Arc<PlaybackQueue>,
    cancel: Arc<CancellationWindow>,
    counters: Arc<PendingCounters>,
    sink: Arc<dyn PlaybackSink>,
    now_playing: Option<NowPlayingCallback>,
    play_lock: Mutex<()>,
}

impl Player {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        cancel: Arc<CancellationWindow>,
        counters: Arc<PendingCounters>,
        sink: Arc<dyn PlaybackSink>,
        now_playing: Option<NowPlayingCallback>,
    ) -> Self {
        Self {
            queue,
            cancel,
            counters,
            sink,
            now_playing,
            play_lock: Mutex::new(()),
        }
    }

    /// Loop until `shutdown` is set.
    pub fn run(&self, shutdown: &AtomicBool) {
        tracing::debug!("Player started");
        while !shutdown.load(Ordering::SeqCst) {
            self.play_next(POP_TIMEOUT);
        }
        tracing::debug!("Player stopped");
    }

    /// Pop and handle one item. Returns `false` if nothing arrived in `wait`.
    pub fn play_next(&self, wait: Duration) -> bool {
        let Some(item) = self.queue.pop_timeout(wait) else {
            return false;
        };

        let _guard = self.play_lock.lock();
        self.handle(&item);
        true
    }

    /// Force-stop the current item.
    pub fn stop(&self) {
        self.sink.stop();
    }

    fn handle(&self, item: &PlaybackItem) {
        if self.cancel.take_cancelled(item.sequence) {
            tracing::info!(request_id = item.sequence, "Skipping cancelled auto line");
        } else {
            if let Some(callback) = &self.now_playing {
                callback(&item.text);
            }
            tracing::info!(
                request_id = item.sequence,
                priority = %item.priority,
                text = %item.text,
                "Playing"
            );
            if let Err(e) = self.sink.play(&item.path) {
                tracing::error!(request_id = item.sequence, error = %e, "Playback failed");
            }
        }

        item.discard_artifact();
        self.counters.dequeue(item.priority.tier());
    }
}
