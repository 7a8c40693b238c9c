//! Keyword reply table.

use std::collections::BTreeMap;

use anchorcast_core::AssistantResponder;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Picks a random configured line for the triggering keyword.
pub struct CannedResponder {
    replies: BTreeMap<String, Vec<String>>,
    rng: Mutex<StdRng>,
}

impl CannedResponder {
    #[must_use]
    pub fn new(replies: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            replies,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic choice, for tests.
    #[must_use]
    pub fn with_seed(replies: BTreeMap<String, Vec<String>>, seed: u64) -> Self {
        Self {
            replies,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl AssistantResponder for CannedResponder {
    fn respond(&self, _recent_text: &str, keyword: &str) -> Option<String> {
        let lines = self.replies.get(keyword)?;
        lines
            .choose(&mut *self.rng.lock())
            .filter(|line| !line.trim().is_empty())
            .cloned()
    }
}
