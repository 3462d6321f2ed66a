//! Token Bucket
//!
//! Throttling primitive that accumulates capacity over time and is depleted
//! by requests, allowing short bursts up to a cap. Refill is lazy: tokens
//! are credited from elapsed wall time at each access, never by a timer.
//!
//! The bucket itself is synchronous and not thread-safe; the rate limiter
//! owns one behind a mutex and performs any waiting outside the lock.

use std::time::{Duration, Instant};

/// Token bucket with lazy refill and deficit reservation.
///
/// # Example
///
/// ```rust
/// use tws_gateway_core::domain::bucket::TokenBucket;
///
/// let mut bucket = TokenBucket::new(10.0, 20.0);
/// assert!(bucket.try_acquire(10.0));
/// assert!(!bucket.try_acquire(15.0));
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens credited per second.
    rate: f64,
    /// Maximum token balance.
    capacity: f64,
    /// Current balance. Transiently negative while a reservation is
    /// outstanding.
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is not strictly positive.
    #[must_use]
    pub fn new(rate: f64, capacity: f64) -> Self {
        assert!(rate > 0.0, "token bucket rate must be positive");
        Self {
            rate,
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Acquire `n` tokens, reserving a deficit if the balance is short.
    ///
    /// Returns the duration the caller must wait before proceeding. A zero
    /// wait means the tokens were available immediately. When the balance is
    /// insufficient the deficit is committed (the balance goes negative) so
    /// the reservation is honored as refill catches up.
    pub fn acquire(&mut self, n: f64) -> Duration {
        self.refill();

        if self.tokens >= n {
            self.tokens -= n;
            return Duration::ZERO;
        }

        let deficit = n - self.tokens;
        self.tokens -= n;
        Duration::from_secs_f64(deficit / self.rate)
    }

    /// Acquire `n` tokens only if they are available right now.
    ///
    /// Never reserves a deficit; returns `false` when the balance is short.
    pub fn try_acquire(&mut self, n: f64) -> bool {
        self.refill();

        if self.tokens >= n {
            self.tokens -= n;
            return true;
        }
        false
    }

    /// Current token balance after refill.
    pub fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    /// Maximum token balance.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Credit tokens for the time elapsed since the last refill.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = self.capacity.min(self.tokens + elapsed * self.rate);
        self.last_refill = now;
    }
}

// =============================================================================
// Tests
// =============================================================================
