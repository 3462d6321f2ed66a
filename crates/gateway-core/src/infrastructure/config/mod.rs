//! Core Configuration Settings
//!
//! Scalar knobs for the connection monitor and the rate limiter, loaded from
//! environment variables with sane defaults. The core consumes these values;
//! it does not own configuration loading policy beyond this module.
//!
//! # Environment Variables
//!
//! All optional, prefixed `TWS_CORE_`:
//!
//! - `TWS_CORE_HEARTBEAT_INTERVAL_SECS` (default: 10)
//! - `TWS_CORE_MAX_RECONNECT_ATTEMPTS` (default: 5)
//! - `TWS_CORE_RECONNECT_DELAY_SECS` (default: 5)
//! - `TWS_CORE_RECONNECT_DELAY_MAX_SECS` (default: 300)
//! - `TWS_CORE_RECONNECT_JITTER` (default: 0.0)
//! - `TWS_CORE_CALL_RETRY_ATTEMPTS` (default: 3)
//! - `TWS_CORE_CALL_RETRY_DELAY_SECS` (default: 1)
//! - `TWS_CORE_MAX_REQUESTS_PER_SEC` (default: 50)
//! - `TWS_CORE_MAX_ORDERS_PER_SEC` (default: 5)
//! - `TWS_CORE_MAX_MARKET_DATA_LINES` (default: 100)
//! - `TWS_CORE_MAX_HISTORICAL_REQUESTS` (default: 60)
//! - `TWS_CORE_HISTORICAL_WINDOW_SECS` (default: 600)
//! - `TWS_CORE_BURST_SIZE` (default: 10)
//! - `TWS_CORE_INITIAL_BACKOFF_MS` (default: 100)
//! - `TWS_CORE_MAX_BACKOFF_MS` (default: 30000)
//! - `TWS_CORE_BACKOFF_MULTIPLIER` (default: 2.0)

use std::time::Duration;

/// Connection monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Interval between liveness checks and heartbeat probes.
    pub heartbeat_interval: Duration,
    /// Maximum attempts in one reconnection sequence.
    pub max_reconnect_attempts: u32,
    /// Base delay between reconnection attempts (doubled per attempt).
    pub reconnect_delay_initial: Duration,
    /// Cap on the per-attempt reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Jitter fraction applied to reconnection delays (0.0 = deterministic).
    pub reconnect_jitter: f64,
    /// Retries performed by the connection-retry call wrapper.
    pub call_retry_attempts: u32,
    /// Base delay between call-wrapper retries (doubled per retry).
    pub call_retry_delay: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            max_reconnect_attempts: 5,
            reconnect_delay_initial: Duration::from_secs(5),
            reconnect_delay_max: Duration::from_secs(300),
            reconnect_jitter: 0.0,
            call_retry_attempts: 3,
            call_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Rate limiter settings.
///
/// Defaults are conservative for the TWS gateway: roughly 50 messages per
/// second overall, 5 order placements per second, 100 concurrent market data
/// lines, and 60 historical-data requests per 10 minutes.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// General message throughput (tokens/second on the general bucket).
    pub max_requests_per_second: u32,
    /// Order placement rate (tokens/second on the order bucket).
    pub max_orders_per_second: u32,
    /// Concurrent market data subscription ceiling.
    pub max_market_data_lines: usize,
    /// Historical-data requests admitted per window.
    pub max_historical_requests: usize,
    /// Historical-data quota window.
    pub historical_window: Duration,
    /// General bucket capacity (allowed burst).
    pub burst_size: u32,
    /// First reactive backoff window after a gateway-reported violation.
    pub initial_backoff: Duration,
    /// Ceiling on the reactive backoff window.
    pub max_backoff: Duration,
    /// Growth factor for consecutive violations.
    pub backoff_multiplier: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests_per_second: 50,
            max_orders_per_second: 5,
            max_market_data_lines: 100,
            max_historical_requests: 60,
            historical_window: Duration::from_secs(600),
            burst_size: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
        }
    }
}

/// Complete core configuration.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// Connection monitor settings.
    pub monitor: MonitorSettings,
    /// Rate limiter settings.
    pub rate_limit: RateLimitSettings,
}

impl CoreConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset or unparseable variables fall back to their defaults; there are
    /// no required variables.
    #[must_use]
    pub fn from_env() -> Self {
        let monitor_defaults = MonitorSettings::default();
        let monitor = MonitorSettings {
            heartbeat_interval: parse_env_duration_secs(
                "TWS_CORE_HEARTBEAT_INTERVAL_SECS",
                monitor_defaults.heartbeat_interval,
            ),
            max_reconnect_attempts: parse_env_u32(
                "TWS_CORE_MAX_RECONNECT_ATTEMPTS",
                monitor_defaults.max_reconnect_attempts,
            ),
            reconnect_delay_initial: parse_env_duration_secs(
                "TWS_CORE_RECONNECT_DELAY_SECS",
                monitor_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "TWS_CORE_RECONNECT_DELAY_MAX_SECS",
                monitor_defaults.reconnect_delay_max,
            ),
            reconnect_jitter: parse_env_f64(
                "TWS_CORE_RECONNECT_JITTER",
                monitor_defaults.reconnect_jitter,
            ),
            call_retry_attempts: parse_env_u32(
                "TWS_CORE_CALL_RETRY_ATTEMPTS",
                monitor_defaults.call_retry_attempts,
            ),
            call_retry_delay: parse_env_duration_secs(
                "TWS_CORE_CALL_RETRY_DELAY_SECS",
                monitor_defaults.call_retry_delay,
            ),
        };

        let limit_defaults = RateLimitSettings::default();
        let rate_limit = RateLimitSettings {
            max_requests_per_second: parse_env_u32(
                "TWS_CORE_MAX_REQUESTS_PER_SEC",
                limit_defaults.max_requests_per_second,
            ),
            max_orders_per_second: parse_env_u32(
                "TWS_CORE_MAX_ORDERS_PER_SEC",
                limit_defaults.max_orders_per_second,
            ),
            max_market_data_lines: parse_env_usize(
                "TWS_CORE_MAX_MARKET_DATA_LINES",
                limit_defaults.max_market_data_lines,
            ),
            max_historical_requests: parse_env_usize(
                "TWS_CORE_MAX_HISTORICAL_REQUESTS",
                limit_defaults.max_historical_requests,
            ),
            historical_window: parse_env_duration_secs(
                "TWS_CORE_HISTORICAL_WINDOW_SECS",
                limit_defaults.historical_window,
            ),
            burst_size: parse_env_u32("TWS_CORE_BURST_SIZE", limit_defaults.burst_size),
            initial_backoff: parse_env_duration_millis(
                "TWS_CORE_INITIAL_BACKOFF_MS",
                limit_defaults.initial_backoff,
            ),
            max_backoff: parse_env_duration_millis(
                "TWS_CORE_MAX_BACKOFF_MS",
                limit_defaults.max_backoff,
            ),
            backoff_multiplier: parse_env_f64(
                "TWS_CORE_BACKOFF_MULTIPLIER",
                limit_defaults.backoff_multiplier,
            ),
        };

        Self {
            monitor,
            rate_limit,
        }
    }
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
