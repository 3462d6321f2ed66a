//! Guarded Gateway Calls
//!
//! Higher-order wrappers that any gateway-bound operation is expected to
//! pass through, one per concern:
//!
//! - [`with_connection_retry`] ensures a live connection and retries
//!   connection-class failures with exponential backoff.
//! - [`rate_limited`] acquires rate limiter permission first and feeds
//!   gateway-reported violations back into the limiter's reactive backoff.
//!
//! The two compose freely around any future-returning closure; the monitor
//! and the limiter never depend on each other.

use std::future::Future;
use std::time::Duration;

use crate::application::ports::SessionError;
use crate::infrastructure::config::MonitorSettings;
use crate::infrastructure::limiter::{OperationClass, RateLimitError, RateLimiter};
use crate::infrastructure::monitor::{ConnectionMonitor, MonitorError};

// =============================================================================
// Fault Classification
// =============================================================================

/// Classifies an error as a connection-class failure worth retrying.
///
/// Implement this for operation error types passed to
/// [`with_connection_retry`]; anything that is not a connection fault
/// propagates immediately without retry.
pub trait ConnectionFault {
    /// Whether this error indicates the connection itself failed.
    fn is_connection_fault(&self) -> bool;
}

impl ConnectionFault for MonitorError {
    fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_) | Self::ConnectionLost | Self::ReconnectExhausted(_)
        )
    }
}

impl ConnectionFault for SessionError {
    fn is_connection_fault(&self) -> bool {
        true
    }
}

/// Classifies an error as a rate violation reported by the gateway.
pub trait RateLimitFault {
    /// Whether this error indicates the gateway rejected the call for
    /// pacing reasons.
    fn is_rate_limit_fault(&self) -> bool;
}

/// Heuristic classification of a gateway error message as a rate violation.
///
/// Useful as a [`RateLimitFault`] implementation for error types that only
/// carry the gateway's message text.
#[must_use]
pub fn message_indicates_rate_limit(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("rate") && lowered.contains("limit")
}

// =============================================================================
// Connection Retry
// =============================================================================

/// Retry schedule for [`with_connection_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts (at least one call is always made).
    pub max_retries: u32,
    /// Base delay between retries (doubled per retry).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy from monitor settings.
    #[must_use]
    pub const fn from_settings(settings: &MonitorSettings) -> Self {
        Self {
            max_retries: settings.call_retry_attempts,
            base_delay: settings.call_retry_delay,
        }
    }
}

/// Run an operation that needs a live connection, retrying connection-class
/// failures.
///
/// If the monitor is not connected, one recovery is triggered before each
/// attempt and the call proceeds regardless of its outcome; the operation
/// itself is the arbiter. Connection faults are retried up to
/// `policy.max_retries` attempts with `base_delay × 2^attempt` between them;
/// any other failure propagates immediately.
///
/// # Errors
///
/// Returns the operation's error once retries are exhausted or immediately
/// for non-connection failures.
pub async fn with_connection_retry<T, E, F, Fut>(
    monitor: &ConnectionMonitor,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ConnectionFault + std::fmt::Display,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0u32;

    loop {
        if !monitor.is_connected() {
            tracing::warn!("connection not available, attempting recovery before call");
            if let Err(e) = monitor.reconnect().await {
                tracing::warn!(error = %e, "recovery before call failed");
            }
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_connection_fault() && attempt + 1 < attempts => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %e,
                    "gateway call hit connection fault, retrying"
                );
                let delay = policy.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// Rate-Limited Calls
// =============================================================================

/// Error from a [`rate_limited`] call.
#[derive(Debug, thiserror::Error)]
pub enum GuardError<E>
where
    E: std::fmt::Display,
{
    /// The rate limiter rejected the call before it was made.
    #[error("call rejected by rate limiter: {0}")]
    RateLimited(#[from] RateLimitError),

    /// The operation itself failed after permission was granted.
    #[error("gateway call failed: {0}")]
    Operation(E),
}

impl<E> ConnectionFault for GuardError<E>
where
    E: ConnectionFault + std::fmt::Display,
{
    fn is_connection_fault(&self) -> bool {
        match self {
            Self::RateLimited(_) => false,
            Self::Operation(e) => e.is_connection_fault(),
        }
    }
}

/// Run an operation behind the rate limiter.
///
/// Acquires permission for the operation class first (absorbing any bucket
/// wait), then runs the operation. A failure the gateway itself attributes
/// to pacing is fed back via
/// [`RateLimiter::handle_rate_limit_error`] before propagating, so
/// subsequent calls fail fast for the backoff window.
///
/// # Errors
///
/// Returns [`GuardError::RateLimited`] for hard-ceiling rejections and
/// [`GuardError::Operation`] for operation failures.
pub async fn rate_limited<T, E, F, Fut>(
    limiter: &RateLimiter,
    class: OperationClass,
    weight: u32,
    op: F,
) -> Result<T, GuardError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RateLimitFault + std::fmt::Display,
{
    limiter.acquire(class, weight).await?;

    match op().await {
        Ok(value) => Ok(value),
        Err(e) => {
            if e.is_rate_limit_fault() {
                limiter.handle_rate_limit_error(&e.to_string());
            }
            Err(GuardError::Operation(e))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
