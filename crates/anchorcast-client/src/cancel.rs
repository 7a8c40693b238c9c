//! Cancellation of stale auto-generated lines.
//!
//! Only the most recent `capacity` auto lines are worth playing. Registering
//! one more pushes the oldest into the cancelled set; the player drops any
//! item whose id it finds there.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct WindowState {
    recent: VecDeque<u64>,
    cancelled: HashSet<u64>,
}

/// Bounded FIFO of auto request ids plus the set of evicted ids.
#[derive(Debug)]
pub struct CancellationWindow {
    capacity: usize,
    state: Mutex<WindowState>,
}

impl CancellationWindow {
    /// A zero capacity is treated as 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Record a new auto request. Returns the id it evicted, if any.
    pub fn register(&self, request_id: u64) -> Option<u64> {
        let mut state = self.state.lock();
        state.recent.push_back(request_id);
        if state.recent.len() > self.capacity {
            let evicted = state.recent.pop_front()?;
            state.cancelled.insert(evicted);
            tracing::debug!(request_id = evicted, "Auto line cancelled by newer ones");
            return Some(evicted);
        }
        None
    }

    /// Check an id at playback time. A cancelled id is removed from the set.
    pub fn take_cancelled(&self, request_id: u64) -> bool {
        self.state.lock().cancelled.remove(&request_id)
    }

    /// Drop every trace of a request that will never reach playback.
    pub fn forget(&self, request_id: u64) {
        let mut state = self.state.lock();
        state.recent.retain(|id| *id != request_id);
        state.cancelled.remove(&request_id);
    }

    #[must_use]
    pub fn is_cancelled(&self, request_id: u64) -> bool {
        self.state.lock().cancelled.contains(&request_id)
    }

    #[must_use]
    pub fn cancelled_len(&self) -> usize {
        self.state.lock().cancelled.len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
