//! Outbound Rate Limiting
//!
//! Gates every outbound gateway call by operation class so the gateway is
//! never sent more traffic than it tolerates, degrading gracefully (wait,
//! not crash) as limits approach. Four independent quota dimensions:
//!
//! - **general**: token bucket over all outbound messages
//! - **order**: the general bucket AND a stricter order bucket
//! - **historical data**: sliding-window ceiling per ten minutes
//! - **market data**: bounded set of concurrently subscribed symbols
//!
//! A reactive backoff window opens when the gateway itself reports a rate
//! violation; while it is open every `acquire` fails fast with the remaining
//! time. Each piece of state sits behind its own mutex and any computed wait
//! is slept outside all locks, so callers contend only briefly.
//!
//! There is no fairness guarantee across concurrent callers: any runnable
//! task may win a given refill.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::bucket::TokenBucket;
use crate::domain::window::SlidingWindowCounter;
use crate::infrastructure::config::RateLimitSettings;
use crate::infrastructure::metrics;

/// Suggested retry delay carried by historical-data rejections.
const HISTORICAL_RETRY_AFTER: Duration = Duration::from_secs(60);

// =============================================================================
// Operation Classes and Error Type
// =============================================================================

/// Class of outbound operation, selecting which quotas apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Any gateway message without a stricter quota.
    General,
    /// Order placement, modification, or cancellation.
    Order,
    /// Historical data request.
    HistoricalData,
    /// Market data subscription traffic.
    MarketData,
}

impl OperationClass {
    /// Get the class name for logging and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Order => "order",
            Self::HistoricalData => "historical_data",
            Self::MarketData => "market_data",
        }
    }
}

/// Which ceiling a rejection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// General throughput bucket.
    General,
    /// Order placement bucket.
    Order,
    /// Historical-data window ceiling.
    HistoricalData,
    /// Concurrent market-data subscription ceiling.
    MarketDataSubscriptions,
    /// Reactive backoff window after a gateway-reported violation.
    Backoff,
}

impl LimitKind {
    /// Get the limit name for reporting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Order => "order",
            Self::HistoricalData => "historical_data",
            Self::MarketDataSubscriptions => "market_data_subscriptions",
            Self::Backoff => "backoff",
        }
    }
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured rejection from a hard ceiling or an active backoff window.
///
/// `retry_after` is the suggested delay before retrying, zero where no
/// automatic retry is sensible (subscription-count ceilings).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded ({kind}): retry after {retry_after:?}")]
pub struct RateLimitError {
    /// Ceiling that rejected the request.
    pub kind: LimitKind,
    /// Suggested delay before retrying.
    pub retry_after: Duration,
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug)]
struct Stats {
    total_requests: u64,
    accepted_requests: u64,
    rejected_requests: u64,
    delayed_requests: u64,
    total_delay: Duration,
    since: Instant,
}

impl Stats {
    fn new() -> Self {
        Self {
            total_requests: 0,
            accepted_requests: 0,
            rejected_requests: 0,
            delayed_requests: 0,
            total_delay: Duration::ZERO,
            since: Instant::now(),
        }
    }
}

/// Point-in-time view of rate limiter activity.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Requests seen by `acquire`.
    pub total_requests: u64,
    /// Requests that were granted (after any wait).
    pub accepted_requests: u64,
    /// Requests rejected by a hard ceiling or backoff window.
    pub rejected_requests: u64,
    /// Requests that had to wait before proceeding.
    pub delayed_requests: u64,
    /// Mean wait across delayed requests, in milliseconds.
    pub avg_delay_ms: f64,
    /// Fraction of requests granted.
    pub acceptance_rate: f64,
    /// Symbols with an active market data subscription.
    pub active_subscriptions: usize,
    /// Whether a reactive backoff window is currently open.
    pub in_backoff: bool,
    /// Consecutive gateway-reported violations.
    pub consecutive_errors: u32,
    /// Seconds since the statistics were last reset.
    pub period_secs: f64,
    /// Wall-clock time the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BackoffState {
    until: Option<Instant>,
    consecutive_errors: u32,
}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Multi-dimensional rate limiter for gateway calls.
///
/// Created once per logical session and injected into every collaborator
/// that talks to the gateway; holds no on-disk state.
pub struct RateLimiter {
    settings: RateLimitSettings,
    general: Mutex<TokenBucket>,
    order: Mutex<TokenBucket>,
    historical: Mutex<SlidingWindowCounter>,
    subscriptions: Mutex<HashSet<String>>,
    backoff: Mutex<BackoffState>,
    stats: Mutex<Stats>,
}

impl RateLimiter {
    /// Create a limiter from settings.
    #[must_use]
    pub fn new(settings: RateLimitSettings) -> Self {
        let general = TokenBucket::new(
            f64::from(settings.max_requests_per_second),
            f64::from(settings.burst_size),
        );
        // The order bucket tolerates a two-second burst at the order rate.
        let order = TokenBucket::new(
            f64::from(settings.max_orders_per_second),
            f64::from(settings.max_orders_per_second * 2),
        );
        let historical = SlidingWindowCounter::new(settings.historical_window);

        Self {
            settings,
            general: Mutex::new(general),
            order: Mutex::new(order),
            historical: Mutex::new(historical),
            subscriptions: Mutex::new(HashSet::new()),
            backoff: Mutex::new(BackoffState::default()),
            stats: Mutex::new(Stats::new()),
        }
    }

    /// Create a limiter with default settings.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RateLimitSettings::default())
    }

    // -------------------------------------------------------------------------
    // Acquisition
    // -------------------------------------------------------------------------

    /// Acquire permission for an operation, waiting out any bucket deficit.
    ///
    /// Bucket and window exhaustion is absorbed as latency; only hard
    /// ceilings (historical window, subscription count, active backoff)
    /// reject.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] carrying the ceiling and a suggested
    /// retry delay when the request cannot be granted by waiting.
    pub async fn acquire(
        &self,
        class: OperationClass,
        weight: u32,
    ) -> Result<(), RateLimitError> {
        self.stats.lock().total_requests += 1;

        if let Some(remaining) = self.backoff_remaining() {
            return Err(self.reject(class, LimitKind::Backoff, remaining));
        }

        let wait = match class {
            OperationClass::General => self.general.lock().acquire(f64::from(weight)),
            OperationClass::Order => {
                // Orders consume from both buckets and honor the larger wait.
                let general_wait = self.general.lock().acquire(f64::from(weight));
                let order_wait = self.order.lock().acquire(1.0);
                general_wait.max(order_wait)
            }
            OperationClass::HistoricalData => {
                {
                    let mut window = self.historical.lock();
                    if window.count() >= self.settings.max_historical_requests {
                        drop(window);
                        return Err(self.reject(
                            class,
                            LimitKind::HistoricalData,
                            HISTORICAL_RETRY_AFTER,
                        ));
                    }
                    window.record();
                }
                self.general.lock().acquire(f64::from(weight))
            }
            OperationClass::MarketData => {
                if self.subscriptions.lock().len() >= self.settings.max_market_data_lines {
                    return Err(self.reject(
                        class,
                        LimitKind::MarketDataSubscriptions,
                        Duration::ZERO,
                    ));
                }
                self.general.lock().acquire(f64::from(weight))
            }
        };

        if wait > Duration::ZERO {
            {
                let mut stats = self.stats.lock();
                stats.delayed_requests += 1;
                stats.total_delay += wait;
            }
            tracing::debug!(
                class = class.as_str(),
                wait_ms = wait.as_millis(),
                "rate limit delay"
            );
            metrics::record_request_delay(class, wait);
            tokio::time::sleep(wait).await;
        }

        self.stats.lock().accepted_requests += 1;
        self.backoff.lock().consecutive_errors = 0;
        metrics::record_request_decision(class, "accepted");
        Ok(())
    }

    /// Acquire permission for a unit-weight operation without waiting.
    ///
    /// Returns `false` when a wait or a rejection would be required. A
    /// successful historical-data probe consumes a window slot, like
    /// [`Self::acquire`].
    pub fn try_acquire(&self, class: OperationClass) -> bool {
        if self.backoff_remaining().is_some() {
            return false;
        }

        match class {
            OperationClass::General => self.general.lock().try_acquire(1.0),
            OperationClass::Order => {
                let mut general = self.general.lock();
                let mut order = self.order.lock();
                if general.available() >= 1.0 && order.available() >= 1.0 {
                    general.try_acquire(1.0) && order.try_acquire(1.0)
                } else {
                    false
                }
            }
            OperationClass::HistoricalData => {
                let mut window = self.historical.lock();
                if window.count() >= self.settings.max_historical_requests {
                    return false;
                }
                if self.general.lock().try_acquire(1.0) {
                    window.record();
                    true
                } else {
                    false
                }
            }
            OperationClass::MarketData => {
                if self.subscriptions.lock().len() >= self.settings.max_market_data_lines {
                    return false;
                }
                self.general.lock().try_acquire(1.0)
            }
        }
    }

    /// Record a rejection and build the error.
    fn reject(
        &self,
        class: OperationClass,
        kind: LimitKind,
        retry_after: Duration,
    ) -> RateLimitError {
        self.stats.lock().rejected_requests += 1;
        tracing::debug!(
            class = class.as_str(),
            limit = kind.as_str(),
            retry_after_ms = retry_after.as_millis(),
            "rate limit rejection"
        );
        metrics::record_request_decision(class, "rejected");
        RateLimitError {
            kind,
            retry_after,
        }
    }

    // -------------------------------------------------------------------------
    // Market data subscriptions
    // -------------------------------------------------------------------------

    /// Track a market data subscription. Idempotent for known symbols.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] with `retry_after` zero when the set is at
    /// its configured maximum.
    pub fn add_subscription(&self, symbol: &str) -> Result<(), RateLimitError> {
        let mut subs = self.subscriptions.lock();
        if subs.contains(symbol) {
            return Ok(());
        }
        if subs.len() >= self.settings.max_market_data_lines {
            drop(subs);
            return Err(self.reject(
                OperationClass::MarketData,
                LimitKind::MarketDataSubscriptions,
                Duration::ZERO,
            ));
        }
        subs.insert(symbol.to_string());
        tracing::debug!(
            symbol,
            active = subs.len(),
            max = self.settings.max_market_data_lines,
            "market data subscription added"
        );
        metrics::record_active_subscriptions(subs.len());
        Ok(())
    }

    /// Drop a tracked subscription. No error if the symbol is absent.
    pub fn remove_subscription(&self, symbol: &str) {
        let mut subs = self.subscriptions.lock();
        if subs.remove(symbol) {
            tracing::debug!(
                symbol,
                active = subs.len(),
                max = self.settings.max_market_data_lines,
                "market data subscription removed"
            );
            metrics::record_active_subscriptions(subs.len());
        }
    }

    /// Drop every tracked subscription.
    pub fn clear_subscriptions(&self) {
        let mut subs = self.subscriptions.lock();
        let count = subs.len();
        subs.clear();
        tracing::info!(count, "cleared market data subscriptions");
        metrics::record_active_subscriptions(0);
    }

    /// Number of symbols with an active subscription.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    // -------------------------------------------------------------------------
    // Reactive backoff
    // -------------------------------------------------------------------------

    /// React to a rate violation reported by the gateway itself.
    ///
    /// Opens (or widens) the backoff window:
    /// `min(max_backoff, initial_backoff × multiplier^consecutive_errors)`.
    /// Subsequent `acquire` calls fail fast until it elapses.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn handle_rate_limit_error(&self, message: &str) {
        let mut backoff = self.backoff.lock();
        backoff.consecutive_errors += 1;

        let exponent = i32::try_from(backoff.consecutive_errors.min(64)).unwrap_or(64);
        let backoff_ms = (self.settings.initial_backoff.as_millis() as f64
            * self.settings.backoff_multiplier.powi(exponent))
        .min(self.settings.max_backoff.as_millis() as f64);
        let window = Duration::from_millis(backoff_ms as u64);
        backoff.until = Some(Instant::now() + window);

        tracing::warn!(
            consecutive = backoff.consecutive_errors,
            backoff_ms = window.as_millis(),
            gateway_error = message,
            "gateway reported rate violation, backing off"
        );
        metrics::record_gateway_violation();
    }

    /// Close the backoff window, e.g. after a verified successful call.
    pub fn reset_backoff(&self) {
        let mut backoff = self.backoff.lock();
        backoff.until = None;
        backoff.consecutive_errors = 0;
    }

    /// Remaining backoff, if a window is open.
    fn backoff_remaining(&self) -> Option<Duration> {
        let backoff = self.backoff.lock();
        let until = backoff.until?;
        let now = Instant::now();
        (now < until).then(|| until - now)
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    /// Serializable statistics snapshot.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> StatsSnapshot {
        let stats = self.stats.lock();
        let delayed = stats.delayed_requests.max(1);
        let total = stats.total_requests.max(1);
        let backoff = self.backoff.lock();

        StatsSnapshot {
            total_requests: stats.total_requests,
            accepted_requests: stats.accepted_requests,
            rejected_requests: stats.rejected_requests,
            delayed_requests: stats.delayed_requests,
            avg_delay_ms: stats.total_delay.as_secs_f64() * 1000.0 / delayed as f64,
            acceptance_rate: stats.accepted_requests as f64 / total as f64,
            active_subscriptions: self.subscriptions.lock().len(),
            in_backoff: backoff
                .until
                .is_some_and(|until| Instant::now() < until),
            consecutive_errors: backoff.consecutive_errors,
            period_secs: stats.since.elapsed().as_secs_f64(),
            captured_at: Utc::now(),
        }
    }

    /// Zero the statistics counters and restart the reporting period.
    pub fn reset_stats(&self) {
        *self.stats.lock() = Stats::new();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> RateLimitSettings {
        RateLimitSettings {
            max_requests_per_second: 100,
            max_orders_per_second: 50,
            max_market_data_lines: 3,
            max_historical_requests: 3,
            historical_window: Duration::from_millis(200),
            burst_size: 5,
            initial_backoff: Duration::from_millis(40),
            max_backoff: Duration::from_millis(120),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn general_acquire_within_burst_is_immediate() {
        let limiter = RateLimiter::new(small_settings());

        let started = Instant::now();
        for _ in 0..5 {
            limiter.acquire(OperationClass::General, 1).await.unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(20));

        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.accepted_requests, 5);
        assert_eq!(stats.delayed_requests, 0);
    }

    #[tokio::test]
    async fn exhausted_bucket_delays_instead_of_failing() {
        let limiter = RateLimiter::new(small_settings());

        // Drain the burst, then the next acquire must wait ~1/rate.
        for _ in 0..5 {
            limiter.acquire(OperationClass::General, 1).await.unwrap();
        }
        let started = Instant::now();
        limiter.acquire(OperationClass::General, 1).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(5));

        let stats = limiter.stats();
        assert_eq!(stats.delayed_requests, 1);
        assert!(stats.avg_delay_ms > 0.0);
    }

    #[tokio::test]
    async fn order_acquire_honors_the_stricter_bucket() {
        let settings = RateLimitSettings {
            max_orders_per_second: 2,
            ..small_settings()
        };
        let limiter = RateLimiter::new(settings);

        // Order bucket: rate 2/s, capacity 4. Drain it.
        for _ in 0..4 {
            limiter.acquire(OperationClass::Order, 1).await.unwrap();
        }

        // General still has headroom; the order bucket forces the wait.
        let started = Instant::now();
        limiter.acquire(OperationClass::Order, 1).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn historical_ceiling_rejects_without_waiting() {
        let limiter = RateLimiter::new(small_settings());

        for _ in 0..3 {
            limiter
                .acquire(OperationClass::HistoricalData, 1)
                .await
                .unwrap();
        }

        let err = limiter
            .acquire(OperationClass::HistoricalData, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, LimitKind::HistoricalData);
        assert_eq!(err.retry_after, HISTORICAL_RETRY_AFTER);
        assert_eq!(limiter.stats().rejected_requests, 1);
    }

    #[tokio::test]
    async fn historical_window_frees_up_after_eviction() {
        let limiter = RateLimiter::new(small_settings());

        for _ in 0..3 {
            limiter
                .acquire(OperationClass::HistoricalData, 1)
                .await
                .unwrap();
        }
        assert!(limiter
            .acquire(OperationClass::HistoricalData, 1)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter
            .acquire(OperationClass::HistoricalData, 1)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejected_historical_probe_consumes_no_slot() {
        let limiter = RateLimiter::new(small_settings());

        for _ in 0..3 {
            limiter
                .acquire(OperationClass::HistoricalData, 1)
                .await
                .unwrap();
        }
        // Rejections must not extend the quota's occupancy.
        for _ in 0..5 {
            assert!(limiter
                .acquire(OperationClass::HistoricalData, 1)
                .await
                .is_err());
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter
            .acquire(OperationClass::HistoricalData, 1)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn market_data_acquire_fails_at_subscription_cap() {
        let limiter = RateLimiter::new(small_settings());

        for symbol in ["SPY", "QQQ", "IWM"] {
            limiter.add_subscription(symbol).unwrap();
        }

        let err = limiter
            .acquire(OperationClass::MarketData, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, LimitKind::MarketDataSubscriptions);
        assert_eq!(err.retry_after, Duration::ZERO);
    }

    #[test]
    fn subscription_cap_and_idempotence() {
        let limiter = RateLimiter::new(small_settings());

        limiter.add_subscription("SPY").unwrap();
        limiter.add_subscription("QQQ").unwrap();
        limiter.add_subscription("IWM").unwrap();

        let err = limiter.add_subscription("TLT").unwrap_err();
        assert_eq!(err.kind, LimitKind::MarketDataSubscriptions);

        // Re-adding a tracked symbol is not a new line.
        limiter.add_subscription("SPY").unwrap();
        assert_eq!(limiter.active_subscriptions(), 3);

        // Freeing one line admits a new symbol.
        limiter.remove_subscription("QQQ");
        limiter.add_subscription("TLT").unwrap();
        assert_eq!(limiter.active_subscriptions(), 3);

        // Removing an unknown symbol is a no-op.
        limiter.remove_subscription("GLD");
        assert_eq!(limiter.active_subscriptions(), 3);

        limiter.clear_subscriptions();
        assert_eq!(limiter.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn backoff_window_fails_fast_then_clears() {
        let limiter = RateLimiter::new(small_settings());

        limiter.handle_rate_limit_error("pacing violation");

        let err = limiter
            .acquire(OperationClass::General, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, LimitKind::Backoff);
        assert!(err.retry_after > Duration::ZERO);
        assert!(limiter.stats().in_backoff);

        // Every class fails while the window is open.
        assert!(limiter.acquire(OperationClass::Order, 1).await.is_err());
        assert!(!limiter.try_acquire(OperationClass::General));

        // First violation: 40ms x 2^1 = 80ms.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(limiter.acquire(OperationClass::General, 1).await.is_ok());
        assert!(!limiter.stats().in_backoff);
    }

    #[tokio::test]
    async fn repeated_violations_grow_to_the_cap() {
        let limiter = RateLimiter::new(small_settings());

        limiter.handle_rate_limit_error("pacing violation");
        let first = limiter
            .acquire(OperationClass::General, 1)
            .await
            .unwrap_err()
            .retry_after;

        limiter.handle_rate_limit_error("pacing violation");
        let second = limiter
            .acquire(OperationClass::General, 1)
            .await
            .unwrap_err()
            .retry_after;
        assert!(second > first);

        for _ in 0..10 {
            limiter.handle_rate_limit_error("pacing violation");
        }
        let capped = limiter
            .acquire(OperationClass::General, 1)
            .await
            .unwrap_err()
            .retry_after;
        assert!(capped <= Duration::from_millis(120), "never beyond max_backoff");
    }

    #[tokio::test]
    async fn successful_acquire_resets_consecutive_errors() {
        let limiter = RateLimiter::new(small_settings());

        limiter.handle_rate_limit_error("pacing violation");
        tokio::time::sleep(Duration::from_millis(120)).await;

        limiter.acquire(OperationClass::General, 1).await.unwrap();
        assert_eq!(limiter.stats().consecutive_errors, 0);
    }

    #[test]
    fn reset_backoff_reopens_traffic() {
        let limiter = RateLimiter::new(small_settings());

        limiter.handle_rate_limit_error("pacing violation");
        assert!(!limiter.try_acquire(OperationClass::General));

        limiter.reset_backoff();
        assert!(limiter.try_acquire(OperationClass::General));
    }

    #[test]
    fn try_acquire_order_needs_both_buckets() {
        let settings = RateLimitSettings {
            max_orders_per_second: 1,
            ..small_settings()
        };
        let limiter = RateLimiter::new(settings);

        // Order bucket capacity 2.
        assert!(limiter.try_acquire(OperationClass::Order));
        assert!(limiter.try_acquire(OperationClass::Order));
        assert!(
            !limiter.try_acquire(OperationClass::Order),
            "order bucket drained while general still has tokens"
        );
        assert!(limiter.try_acquire(OperationClass::General));
    }

    #[test]
    fn try_acquire_historical_respects_the_window() {
        let limiter = RateLimiter::new(small_settings());

        assert!(limiter.try_acquire(OperationClass::HistoricalData));
        assert!(limiter.try_acquire(OperationClass::HistoricalData));
        assert!(limiter.try_acquire(OperationClass::HistoricalData));
        assert!(!limiter.try_acquire(OperationClass::HistoricalData));
    }

    #[tokio::test]
    async fn stats_snapshot_serializes() {
        let limiter = RateLimiter::new(small_settings());
        limiter.acquire(OperationClass::General, 1).await.unwrap();
        limiter.add_subscription("SPY").unwrap();

        let json = serde_json::to_value(limiter.stats()).unwrap();
        assert_eq!(json["total_requests"], 1);
        assert_eq!(json["active_subscriptions"], 1);
        assert_eq!(json["in_backoff"], false);
        assert!(json["acceptance_rate"].as_f64().unwrap() > 0.99);
    }

    #[tokio::test]
    async fn reset_stats_zeroes_counters() {
        let limiter = RateLimiter::new(small_settings());
        limiter.acquire(OperationClass::General, 1).await.unwrap();

        limiter.reset_stats();
        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.accepted_requests, 0);
    }
}
