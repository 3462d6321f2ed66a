//! Sliding Window Counter
//!
//! Counts events within a trailing fixed duration, evicting stale entries on
//! every access. Used for long-horizon quotas where a token bucket's burst
//! behavior is the wrong shape (e.g., historical-data requests per ten
//! minutes).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Counter over a trailing time window.
///
/// After any access every retained timestamp is within `window` of now.
#[derive(Debug)]
pub struct SlidingWindowCounter {
    window: Duration,
    samples: VecDeque<Instant>,
}

impl SlidingWindowCounter {
    /// Create a counter over the given trailing window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Record an event and return the resulting in-window count.
    pub fn record(&mut self) -> usize {
        let now = Instant::now();
        self.evict(now);
        self.samples.push_back(now);
        self.samples.len()
    }

    /// Current in-window count, without recording anything.
    pub fn count(&mut self) -> usize {
        self.evict(Instant::now());
        self.samples.len()
    }

    /// Window duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Drop every sample older than `now - window`.
    fn evict(&mut self, now: Instant) {
        while let Some(&front) = self.samples.front() {
            if now.duration_since(front) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_returns_running_count() {
        let mut counter = SlidingWindowCounter::new(Duration::from_secs(1));
        assert_eq!(counter.record(), 1);
        assert_eq!(counter.record(), 2);
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn stale_samples_are_evicted() {
        let mut counter = SlidingWindowCounter::new(Duration::from_millis(100));
        counter.record();
        counter.record();

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn eviction_is_partial_when_samples_straddle_the_window() {
        let mut counter = SlidingWindowCounter::new(Duration::from_millis(120));
        counter.record();
        std::thread::sleep(Duration::from_millis(80));
        counter.record();

        std::thread::sleep(Duration::from_millis(60));
        // First sample is ~140ms old, second ~60ms.
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn count_does_not_record() {
        let mut counter = SlidingWindowCounter::new(Duration::from_secs(10));
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.record(), 1);
    }
}
