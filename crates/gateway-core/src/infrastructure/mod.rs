//! Infrastructure layer - Async monitor, rate limiter, configuration,
//! guarded-call wrappers, and metric recording.

/// Configuration settings.
pub mod config;

/// Guarded-call wrappers composing the monitor and the limiter.
pub mod guard;

/// Multi-dimensional outbound rate limiting.
pub mod limiter;

/// Metric recording helpers.
pub mod metrics;

/// Connection health monitoring and recovery.
pub mod monitor;
