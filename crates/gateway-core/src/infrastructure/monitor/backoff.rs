//! Reconnection Backoff Schedule
//!
//! Computes the delay before each attempt of a reconnection sequence:
//! exponential growth from a base delay, capped, with optional jitter.
//! Attempt numbering starts at 1, so the first attempt waits exactly the
//! base delay when jitter is disabled.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::MonitorSettings;

/// Backoff schedule for a reconnection sequence.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl ReconnectPolicy {
    /// Create a policy with explicit values.
    #[must_use]
    pub const fn new(base_delay: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor,
        }
    }

    /// Create a policy from monitor settings.
    #[must_use]
    pub const fn from_settings(settings: &MonitorSettings) -> Self {
        Self {
            base_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            jitter_factor: settings.reconnect_jitter,
        }
    }

    /// Delay to sleep before the given attempt (counted from 1).
    ///
    /// `base × 2^(attempt-1)`, clamped to the configured maximum, then
    /// jittered by ± `jitter_factor` when enabled.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let scaled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        self.apply_jitter(scaled)
    }

    /// Apply jitter to a duration.
    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}
