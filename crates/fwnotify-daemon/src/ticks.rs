//! Monotonic tick source.
//!
//! Staleness logic (dedup window, rule cache age) compares millisecond tick
//! values rather than reading the clock inline, so tests can drive time
//! explicitly. [`SystemTicks`] is the production implementation;
//! [`ManualTicks`] is for tests and embedders that replay recorded events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of monotonic millisecond ticks.
pub trait TickSource: Send + Sync {
    /// Milliseconds elapsed on a monotonic clock. The epoch is arbitrary;
    /// only differences are meaningful.
    fn now_ms(&self) -> u64;
}

/// Tick source backed by [`Instant`], anchored at construction.
#[derive(Debug)]
pub struct SystemTicks {
    start: Instant,
}

impl SystemTicks {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemTicks {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually-advanced tick source.
#[derive(Debug, Default)]
pub struct ManualTicks {
    now_ms: AtomicU64,
}

impl ManualTicks {
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Moves the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute tick.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl TickSource for ManualTicks {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_ticks_are_monotonic() {
        let ticks = SystemTicks::new();
        let a = ticks.now_ms();
        let b = ticks.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn manual_ticks_advance_and_set() {
        let ticks = ManualTicks::new(100);
        assert_eq!(ticks.now_ms(), 100);
        ticks.advance(50);
        assert_eq!(ticks.now_ms(), 150);
        ticks.set(10);
        assert_eq!(ticks.now_ms(), 10);
    }
}
