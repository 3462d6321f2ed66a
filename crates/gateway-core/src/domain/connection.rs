//! Connection State Machine
//!
//! Tracks the lifecycle of the single logical gateway session and the health
//! metrics derived from it. The state value is the sole source of truth for
//! whether outbound calls may be attempted; every mutation goes through
//! [`ConnectionHealth::transition`], which rejects illegal transitions and
//! leaves the state untouched.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Heartbeat age beyond which a connected session is reported unhealthy.
const HEALTHY_HEARTBEAT_AGE: Duration = Duration::from_secs(30);

// =============================================================================
// Connection State
// =============================================================================

/// States of the gateway connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session established and no recovery in progress.
    #[default]
    Disconnected,
    /// Initial connection attempt in flight.
    Connecting,
    /// Session established and believed alive.
    Connected,
    /// Recovery sequence in flight.
    Reconnecting,
    /// Connection failed and recovery is exhausted or not yet triggered.
    Error,
    /// Monitor stopped. Terminal.
    Shutdown,
}

impl ConnectionState {
    /// Get the state name for reporting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Whether a transition to `to` is legal.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        // Any non-terminal state may be shut down.
        if matches!(to, Self::Shutdown) {
            return !self.is_terminal();
        }

        match self {
            Self::Disconnected => matches!(to, Self::Connecting | Self::Reconnecting),
            Self::Connecting => matches!(to, Self::Connected | Self::Error),
            Self::Connected => matches!(to, Self::Disconnected | Self::Reconnecting),
            Self::Reconnecting => matches!(to, Self::Connected | Self::Error),
            Self::Error => matches!(to, Self::Reconnecting),
            Self::Shutdown => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a lifecycle transition is not legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal connection state transition: {from} -> {to}")]
pub struct TransitionError {
    /// State the machine was in.
    pub from: ConnectionState,
    /// State the caller requested.
    pub to: ConnectionState,
}

// =============================================================================
// Connection Health
// =============================================================================

/// Health metrics for the gateway connection.
///
/// Mutated only by the connection monitor; collaborators read it through
/// [`HealthSnapshot`].
#[derive(Debug)]
pub struct ConnectionHealth {
    state: ConnectionState,
    last_heartbeat: Option<Instant>,
    connected_at: Option<Instant>,
    reconnect_count: u64,
    error_count: u64,
    last_error: Option<String>,
    latency: Option<Duration>,
    messages_sent: u64,
    messages_received: u64,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionHealth {
    /// Create health state for a fresh, disconnected monitor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_heartbeat: None,
            connected_at: None,
            reconnect_count: 0,
            error_count: 0,
            last_error: None,
            latency: None,
            messages_sent: 0,
            messages_received: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Attempt a lifecycle transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] and leaves the state unchanged if the
    /// transition is not in the legal set.
    pub fn transition(&mut self, to: ConnectionState) -> Result<(), TransitionError> {
        if !self.state.can_transition(to) {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Record a successful connection establishment.
    pub fn record_connected(&mut self) {
        let now = Instant::now();
        self.connected_at = Some(now);
        self.last_heartbeat = Some(now);
    }

    /// Record a successful heartbeat probe and its round-trip latency.
    pub fn record_heartbeat(&mut self, latency: Duration) {
        self.last_heartbeat = Some(Instant::now());
        self.latency = Some(latency);
    }

    /// Record an error observation.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        self.last_error = Some(message.into());
    }

    /// Count a completed reconnection sequence.
    pub fn record_reconnect(&mut self) {
        self.reconnect_count += 1;
    }

    /// Count a message sent through the connection.
    pub fn record_message_sent(&mut self) {
        self.messages_sent += 1;
    }

    /// Count a message received from the connection.
    pub fn record_message_received(&mut self) {
        self.messages_received += 1;
    }

    /// Number of completed reconnection sequences.
    #[must_use]
    pub const fn reconnect_count(&self) -> u64 {
        self.reconnect_count
    }

    /// Number of observed errors.
    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Age of the most recent heartbeat, if one was ever recorded.
    #[must_use]
    pub fn heartbeat_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    /// Connection uptime, `None` if never connected.
    #[must_use]
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_at.map(|t| t.elapsed())
    }

    /// Whether the connection is healthy: connected with a recent heartbeat.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        self.heartbeat_age()
            .is_some_and(|age| age < HEALTHY_HEARTBEAT_AGE)
    }

    /// Produce a serializable snapshot for reporting.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state.as_str(),
            healthy: self.is_healthy(),
            uptime_secs: self.uptime().map(|d| d.as_secs()),
            reconnect_count: self.reconnect_count,
            error_count: self.error_count,
            latency_ms: self.latency.map(|d| d.as_secs_f64() * 1000.0),
            last_error: self.last_error.clone(),
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            captured_at: Utc::now(),
        }
    }
}

/// Point-in-time view of connection health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Lifecycle state name.
    pub state: &'static str,
    /// Connected with a recent heartbeat.
    pub healthy: bool,
    /// Seconds since the session was established, if ever.
    pub uptime_secs: Option<u64>,
    /// Completed reconnection sequences.
    pub reconnect_count: u64,
    /// Observed errors.
    pub error_count: u64,
    /// Last heartbeat round-trip latency in milliseconds.
    pub latency_ms: Option<f64>,
    /// Most recent error message.
    pub last_error: Option<String>,
    /// Messages sent through the connection.
    pub messages_sent: u64,
    /// Messages received from the connection.
    pub messages_received: u64,
    /// Wall-clock time the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(ConnectionState::Disconnected, ConnectionState::Connecting, true; "start")]
    #[test_case(ConnectionState::Disconnected, ConnectionState::Reconnecting, true; "recovery from idle")]
    #[test_case(ConnectionState::Connecting, ConnectionState::Connected, true; "connect succeeds")]
    #[test_case(ConnectionState::Connecting, ConnectionState::Error, true; "connect fails")]
    #[test_case(ConnectionState::Connected, ConnectionState::Disconnected, true; "heartbeat loss")]
    #[test_case(ConnectionState::Connected, ConnectionState::Reconnecting, true; "recovery from live")]
    #[test_case(ConnectionState::Reconnecting, ConnectionState::Connected, true; "recovery succeeds")]
    #[test_case(ConnectionState::Reconnecting, ConnectionState::Error, true; "attempts exhausted")]
    #[test_case(ConnectionState::Error, ConnectionState::Reconnecting, true; "retrigger after error")]
    #[test_case(ConnectionState::Connected, ConnectionState::Shutdown, true; "stop while live")]
    #[test_case(ConnectionState::Disconnected, ConnectionState::Connected, false; "skip connecting")]
    #[test_case(ConnectionState::Connected, ConnectionState::Connecting, false; "connect while live")]
    #[test_case(ConnectionState::Error, ConnectionState::Connected, false; "error straight to live")]
    #[test_case(ConnectionState::Shutdown, ConnectionState::Connecting, false; "restart after shutdown")]
    #[test_case(ConnectionState::Shutdown, ConnectionState::Reconnecting, false; "recover after shutdown")]
    #[test_case(ConnectionState::Shutdown, ConnectionState::Shutdown, false; "shutdown is terminal")]
    fn transition_legality(from: ConnectionState, to: ConnectionState, legal: bool) {
        assert_eq!(from.can_transition(to), legal);
    }

    #[test]
    fn every_live_state_can_shut_down() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Error,
        ] {
            assert!(state.can_transition(ConnectionState::Shutdown));
        }
    }

    #[test]
    fn illegal_transition_leaves_state_unchanged() {
        let mut health = ConnectionHealth::new();
        health.transition(ConnectionState::Shutdown).unwrap();

        let err = health.transition(ConnectionState::Connecting).unwrap_err();
        assert_eq!(err.from, ConnectionState::Shutdown);
        assert_eq!(err.to, ConnectionState::Connecting);
        assert_eq!(health.state(), ConnectionState::Shutdown);
    }

    #[test]
    fn healthy_requires_connected_state() {
        let mut health = ConnectionHealth::new();
        health.record_heartbeat(Duration::from_millis(5));
        assert!(!health.is_healthy(), "disconnected is never healthy");

        health.transition(ConnectionState::Connecting).unwrap();
        health.transition(ConnectionState::Connected).unwrap();
        assert!(health.is_healthy());
    }

    #[test]
    fn healthy_requires_recent_heartbeat() {
        let mut health = ConnectionHealth::new();
        health.transition(ConnectionState::Connecting).unwrap();
        health.transition(ConnectionState::Connected).unwrap();
        assert!(!health.is_healthy(), "no heartbeat seen yet");

        health.record_heartbeat(Duration::from_millis(2));
        assert!(health.is_healthy());
    }

    #[test]
    fn uptime_undefined_until_connected() {
        let mut health = ConnectionHealth::new();
        assert!(health.uptime().is_none());

        health.record_connected();
        assert!(health.uptime().is_some());
    }

    #[test]
    fn counters_accumulate() {
        let mut health = ConnectionHealth::new();
        health.record_error("refused");
        health.record_error("timed out");
        health.record_reconnect();
        health.record_message_sent();
        health.record_message_received();
        health.record_message_received();

        let snap = health.snapshot();
        assert_eq!(snap.error_count, 2);
        assert_eq!(snap.reconnect_count, 1);
        assert_eq!(snap.messages_sent, 1);
        assert_eq!(snap.messages_received, 2);
        assert_eq!(snap.last_error.as_deref(), Some("timed out"));
    }

    #[test]
    fn snapshot_serializes() {
        let mut health = ConnectionHealth::new();
        health.transition(ConnectionState::Connecting).unwrap();
        health.transition(ConnectionState::Connected).unwrap();
        health.record_connected();
        health.record_heartbeat(Duration::from_millis(3));

        let json = serde_json::to_value(health.snapshot()).unwrap();
        assert_eq!(json["state"], "connected");
        assert_eq!(json["healthy"], true);
        assert!(json["latency_ms"].as_f64().unwrap() > 0.0);
    }
}
