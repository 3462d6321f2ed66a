#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! TWS Gateway Core - Connection Resilience and Flow Control
//!
//! Keeps a single persistent session to the TWS desktop trading gateway
//! alive and throttles outbound calls across independent quota dimensions.
//! Every higher-level module that talks to the gateway consumes this crate
//! through two narrow contracts: acquire permission before an outbound call,
//! and borrow a healthy connection.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure state machines and throttling primitives
//!   - `connection`: Lifecycle state machine and health bookkeeping
//!   - `bucket` / `window`: Token bucket and sliding-window counter
//!
//! - **Application**: Port definitions
//!   - `ports`: Gateway session and session factory contracts
//!
//! - **Infrastructure**: Async services and adapters
//!   - `monitor`: Liveness checks, heartbeats, bounded reconnection
//!   - `limiter`: Multi-dimensional outbound rate limiting
//!   - `guard`: Guarded-call wrappers composing the two
//!   - `config`: Environment-driven settings
//!   - `metrics`: Metric recording through the `metrics` facade
//!
//! # Control Flow
//!
//! ```text
//!  caller ──► RateLimiter::acquire ──► ConnectionMonitor::connection ──► gateway
//!                  │                            ▲
//!                  └── waits / fail-fast        └── liveness + heartbeat loops,
//!                                                   bounded reconnection
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure state machines and throttling primitives.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Async services and adapters.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::{
    ConnectionHealth, ConnectionState, HealthSnapshot, TransitionError,
};

// Ports
pub use application::ports::{GatewaySession, SessionError, SessionFactory};

// Infrastructure config
pub use infrastructure::config::{CoreConfig, MonitorSettings, RateLimitSettings};

// Connection monitor
pub use infrastructure::monitor::{ConnectionMonitor, MonitorError, backoff::ReconnectPolicy};

// Rate limiter
pub use infrastructure::limiter::{
    LimitKind, OperationClass, RateLimitError, RateLimiter, StatsSnapshot,
};

// Guarded calls
pub use infrastructure::guard::{
    ConnectionFault, GuardError, RateLimitFault, RetryPolicy, message_indicates_rate_limit,
    rate_limited, with_connection_retry,
};

// Metrics
pub use infrastructure::metrics::register_metrics;
