//! Pending work counters used for admission control.

use std::sync::atomic::{AtomicU64, Ordering};

use anchorcast_core::PriorityTier;

/// A consistent reading of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Chunks sent whose request is not reassembled yet.
    pub in_flight: u32,
    pub urgent_queued: u16,
    pub normal_queued: u16,
}

impl CounterSnapshot {
    #[must_use]
    pub fn unprocessed(&self) -> usize {
        self.in_flight as usize + usize::from(self.urgent_queued) + usize::from(self.normal_queued)
    }

    #[must_use]
    pub const fn queued(&self, tier: PriorityTier) -> u16 {
        match tier {
            PriorityTier::Urgent => self.urgent_queued,
            PriorityTier::Normal => self.normal_queued,
        }
    }

    const fn queued_mut(&mut self, tier: PriorityTier) -> &mut u16 {
        match tier {
            PriorityTier::Urgent => &mut self.urgent_queued,
            PriorityTier::Normal => &mut self.normal_queued,
        }
    }

    const fn pack(self) -> u64 {
        (self.in_flight as u64) | ((self.urgent_queued as u64) << 32) | ((self.normal_queued as u64) << 48)
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn unpack(raw: u64) -> Self {
        Self {
            in_flight: raw as u32,
            urgent_queued: (raw >> 32) as u16,
            normal_queued: (raw >> 48) as u16,
        }
    }
}

/// Outstanding work on the client, held in a single atomic word.
///
/// Every transition, including moving a finished request from in-flight to
/// queued, is one atomic update, so [`unprocessed`](Self::unprocessed) never
/// observes a half-applied change. Decrements saturate at zero.
#[derive(Debug, Default)]
pub struct PendingCounters {
    packed: AtomicU64,
}

impl PendingCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_in_flight(&self, chunks: usize) {
        let chunks = clamp_u32(chunks);
        self.update(|mut c| {
            c.in_flight = c.in_flight.saturating_add(chunks);
            c
        });
    }

    /// Release all chunks of an abandoned or unplayable request at once.
    pub fn release_in_flight(&self, chunks: usize) {
        let chunks = clamp_u32(chunks);
        self.update(|mut c| {
            c.in_flight = c.in_flight.saturating_sub(chunks);
            c
        });
    }

    /// Move a reassembled request out of flight and into the playback queue.
    pub fn promote(&self, chunks: usize, tier: PriorityTier) {
        let chunks = clamp_u32(chunks);
        self.update(|mut c| {
            c.in_flight = c.in_flight.saturating_sub(chunks);
            let queued = c.queued_mut(tier);
            *queued = queued.saturating_add(1);
            c
        });
    }

    pub fn enqueue(&self, tier: PriorityTier) {
        self.update(|mut c| {
            let queued = c.queued_mut(tier);
            *queued = queued.saturating_add(1);
            c
        });
    }

    pub fn dequeue(&self, tier: PriorityTier) {
        self.update(|mut c| {
            let queued = c.queued_mut(tier);
            *queued = queued.saturating_sub(1);
            c
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot::unpack(self.packed.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.snapshot().in_flight as usize
    }

    #[must_use]
    pub fn queued(&self, tier: PriorityTier) -> usize {
        usize::from(self.snapshot().queued(tier))
    }

    /// In-flight chunks plus queued items of both tiers.
    #[must_use]
    pub fn unprocessed(&self) -> usize {
        self.snapshot().unprocessed()
    }

    fn update(&self, apply: impl Fn(CounterSnapshot) -> CounterSnapshot) {
        let mut current = self.packed.load(Ordering::SeqCst);
        loop {
            let next = apply(CounterSnapshot::unpack(current)).pack();
            match self
                .packed
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

fn clamp_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
