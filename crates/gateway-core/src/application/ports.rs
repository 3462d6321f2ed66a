//! Port Interfaces
//!
//! Contracts the externally supplied gateway session must satisfy. The core
//! never implements the wire protocol itself; it drives whatever session the
//! embedding application provides through these two traits.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`GatewaySession`]: one live session to the trading gateway
//! - [`SessionFactory`]: produces sessions for initial connect and recovery
//!
//! Liveness probing is a capability with a fallback: sessions that support a
//! real round-trip override [`GatewaySession::ping`]; for the rest the
//! default implementation answers from the [`GatewaySession::is_connected`]
//! predicate. The monitor resolves this once through the vtable rather than
//! re-probing per call.

use std::sync::Arc;

use async_trait::async_trait;

/// Errors surfaced by the externally supplied gateway session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The session could not be established.
    #[error("failed to establish gateway session: {0}")]
    ConnectFailed(String),

    /// The session no longer answers liveness probes.
    #[error("gateway session unreachable: {0}")]
    Unreachable(String),
}

/// One live session to the trading gateway.
///
/// Implementations wrap the brokerage API object. All methods are invoked
/// only by the connection monitor; collaborators borrow the session through
/// the monitor's `connection()` accessor while it is connected.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewaySession: Send + Sync {
    /// Establish the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConnectFailed`] if the gateway cannot be
    /// reached or rejects the session.
    async fn connect(&self) -> Result<(), SessionError>;

    /// Tear the session down. Best effort; never fails.
    async fn disconnect(&self);

    /// Primary liveness predicate.
    fn is_connected(&self) -> bool;

    /// Round-trip liveness probe.
    ///
    /// The default implementation answers from [`Self::is_connected`],
    /// treating a dead predicate as an unreachable session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unreachable`] when the session does not
    /// answer.
    async fn ping(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SessionError::Unreachable(
                "session reports not connected".to_string(),
            ))
        }
    }
}

/// Produces gateway sessions for initial connection and recovery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Create a fresh, not-yet-connected session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if a session object cannot be produced.
    async fn create(&self) -> Result<Arc<dyn GatewaySession>, SessionError>;
}
