//! Burst deduplication for drop events.
//!
//! A blocked application usually retries its connection immediately, so one
//! user-visible decision corresponds to a burst of identical drop events.
//! [`DedupCache`] suppresses the repeats: a path observed again within the
//! staleness window is reported as a duplicate and never re-enters the
//! pipeline.
//!
//! The cache is a fixed slot array scanned linearly on every call. Eviction
//! replaces the globally-oldest slot rather than tracking per-key recency;
//! with tens of slots and event rates bounded by real network drops, the
//! O(capacity) scan is cheaper than bookkeeping. Callers must serialize
//! access externally (the monitor holds a dedicated mutex around it).

use std::time::Duration;

use tracing::trace;

/// Default number of slots.
pub const DEFAULT_CAPACITY: usize = 32;

/// Default staleness window. A duplicate older than this propagates again.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone)]
struct Slot {
    path: Option<String>,
    /// Monotonic tick of the last observation, in milliseconds. Empty slots
    /// keep 0 so the oldest-slot scan fills them first.
    seen_at_ms: u64,
}

/// Fixed-capacity, age-bounded set of recently observed raw paths.
#[derive(Debug)]
pub struct DedupCache {
    slots: Vec<Slot>,
    window: Duration,
}

impl DedupCache {
    /// Creates a cache with the given slot count and staleness window.
    ///
    /// A zero `capacity` is bumped to one slot so `observe` stays total.
    #[must_use]
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            slots: vec![Slot::default(); capacity.max(1)],
            window,
        }
    }

    /// Creates a cache with the default capacity and window.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }

    /// Returns the slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Records an observation of `path` at monotonic tick `now_ms`.
    ///
    /// Returns `true` when the path is new (or its previous observation has
    /// aged past the window) and should propagate; `false` when it is a
    /// duplicate to suppress. A propagating path overwrites the
    /// globally-oldest slot.
    pub fn observe(&mut self, path: &str, now_ms: u64) -> bool {
        let window_ms = self.window.as_millis() as u64;
        let mut oldest_ix = 0;
        let mut oldest_ms = u64::MAX;

        for (ix, slot) in self.slots.iter().enumerate() {
            if slot.seen_at_ms < oldest_ms {
                oldest_ms = slot.seen_at_ms;
                oldest_ix = ix;
            }

            let Some(existing) = slot.path.as_deref() else {
                continue;
            };

            if now_ms.saturating_sub(slot.seen_at_ms) < window_ms && existing == path {
                trace!(path, "suppressed duplicate drop event");
                return false;
            }
        }

        let slot = &mut self.slots[oldest_ix];
        slot.path = Some(path.to_string());
        slot.seen_at_ms = now_ms;

        true
    }
}
