//! Connection Monitor
//!
//! Owns the single logical session to the trading gateway: establishes it,
//! periodically verifies it is alive, and repairs it autonomously with
//! bounded exponential backoff. Collaborators never hold the session across
//! a recovery; they borrow it through [`ConnectionMonitor::connection`],
//! which yields a handle only while the state machine is `Connected`.
//!
//! Two background tasks run while the monitor is started: a liveness check
//! that triggers recovery when the session or its heartbeat goes stale, and
//! a heartbeat probe that records round-trip latency. Both are cancelled and
//! awaited on `stop()` before the session handle is released, so no probe
//! ever fires against a half-torn-down connection.

pub mod backoff;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{GatewaySession, SessionError, SessionFactory};
use crate::domain::connection::{
    ConnectionHealth, ConnectionState, HealthSnapshot, TransitionError,
};
use crate::infrastructure::config::MonitorSettings;
use crate::infrastructure::metrics;

use backoff::ReconnectPolicy;

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced by the connection monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The gateway session could not be established.
    #[error("failed to connect to gateway: {0}")]
    ConnectFailed(#[source] SessionError),

    /// The session stopped answering liveness probes.
    #[error("connection to gateway lost")]
    ConnectionLost,

    /// A full reconnection sequence failed.
    #[error("reconnection attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    /// The monitor was stopped and cannot be restarted.
    #[error("connection monitor is shut down")]
    Shutdown,

    /// A lifecycle operation was requested from an incompatible state.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

// =============================================================================
// Lifecycle Callbacks
// =============================================================================

/// Callback invoked on connect/disconnect.
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked when recovery is exhausted.
pub type ErrorCallback = Arc<dyn Fn(&MonitorError) + Send + Sync>;

/// Single-slot callback registrations. Last registration wins. Invocation is
/// best effort: a panic inside a callback is logged and swallowed, never
/// allowed to unwind into the monitor.
#[derive(Default)]
struct Callbacks {
    connected: RwLock<Option<LifecycleCallback>>,
    disconnected: RwLock<Option<LifecycleCallback>>,
    error: RwLock<Option<ErrorCallback>>,
}

impl Callbacks {
    fn notify_connected(&self) {
        if let Some(cb) = self.connected.read().clone() {
            Self::invoke("connected", || cb());
        }
    }

    fn notify_disconnected(&self) {
        if let Some(cb) = self.disconnected.read().clone() {
            Self::invoke("disconnected", || cb());
        }
    }

    fn notify_error(&self, error: &MonitorError) {
        if let Some(cb) = self.error.read().clone() {
            Self::invoke("error", || cb(error));
        }
    }

    fn invoke(name: &str, f: impl FnOnce()) {
        if std::panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
            tracing::error!(callback = name, "lifecycle callback panicked");
        }
    }
}

// =============================================================================
// Connection Monitor
// =============================================================================

/// Monitors gateway connection health and handles automatic recovery.
///
/// Created once per logical session and shared as `Arc<ConnectionMonitor>`.
/// Holds no on-disk state; fully reconstructible from [`MonitorSettings`].
pub struct ConnectionMonitor {
    settings: MonitorSettings,
    policy: ReconnectPolicy,
    factory: Arc<dyn SessionFactory>,
    health: RwLock<ConnectionHealth>,
    session: RwLock<Option<Arc<dyn GatewaySession>>>,
    callbacks: Callbacks,
    /// Serializes reconnection: held across the whole multi-attempt
    /// sequence, so concurrent triggers share a single outcome.
    reconnect_gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    liveness_task: Mutex<Option<JoinHandle<()>>>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionMonitor {
    /// Create a monitor for the given session factory.
    #[must_use]
    pub fn new(factory: Arc<dyn SessionFactory>, settings: MonitorSettings) -> Self {
        let policy = ReconnectPolicy::from_settings(&settings);
        Self {
            settings,
            policy,
            factory,
            health: RwLock::new(ConnectionHealth::new()),
            session: RwLock::new(None),
            callbacks: Callbacks::default(),
            reconnect_gate: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            liveness_task: Mutex::new(None),
            heartbeat_task: Mutex::new(None),
        }
    }

    /// Create a monitor with default settings.
    #[must_use]
    pub fn with_defaults(factory: Arc<dyn SessionFactory>) -> Self {
        Self::new(factory, MonitorSettings::default())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Establish the initial connection and launch the background checks.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidTransition`] unless the monitor is
    /// freshly constructed, and [`MonitorError::ConnectFailed`] if the
    /// factory or the session's `connect` fails; the state is then `Error`
    /// and recovery can be triggered via [`Self::reconnect`].
    pub async fn start(self: &Arc<Self>) -> Result<(), MonitorError> {
        tracing::info!("starting connection monitor");
        self.health.write().transition(ConnectionState::Connecting)?;

        if let Err(e) = self.establish().await {
            let mut health = self.health.write();
            health.record_error(e.to_string());
            let _ = health.transition(ConnectionState::Error);
            drop(health);
            metrics::record_connection_state(ConnectionState::Error);
            tracing::error!(error = %e, "failed to start connection monitor");
            return Err(e);
        }

        let liveness = tokio::spawn({
            let monitor = Arc::clone(self);
            async move { monitor.liveness_loop().await }
        });
        *self.liveness_task.lock() = Some(liveness);

        let heartbeat = tokio::spawn({
            let monitor = Arc::clone(self);
            async move { monitor.heartbeat_loop().await }
        });
        *self.heartbeat_task.lock() = Some(heartbeat);

        Ok(())
    }

    /// Stop monitoring, await the background checks, and disconnect.
    ///
    /// Idempotent; the monitor is terminal afterwards.
    pub async fn stop(&self) {
        {
            let mut health = self.health.write();
            if health.state() == ConnectionState::Shutdown {
                return;
            }
            let _ = health.transition(ConnectionState::Shutdown);
        }
        tracing::info!("stopping connection monitor");
        self.cancel.cancel();

        let liveness = self.liveness_task.lock().take();
        if let Some(handle) = liveness {
            let _ = handle.await;
        }
        let heartbeat = self.heartbeat_task.lock().take();
        if let Some(handle) = heartbeat {
            let _ = handle.await;
        }

        let session = self.session.write().take();
        if let Some(session) = session {
            session.disconnect().await;
        }

        metrics::record_connection_state(ConnectionState::Shutdown);
        self.callbacks.notify_disconnected();
        tracing::info!("connection monitor stopped");
    }

    /// Run one serialized reconnection sequence.
    ///
    /// Returns immediately when already connected. Concurrent callers block
    /// on the sequence in flight and then observe its outcome through the
    /// state machine.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ReconnectExhausted`] when every attempt
    /// failed (the state is then `Error` and the error callback has fired),
    /// or [`MonitorError::Shutdown`] if the monitor was stopped mid-sequence.
    pub async fn reconnect(&self) -> Result<(), MonitorError> {
        let _gate = self.reconnect_gate.lock().await;

        {
            let mut health = self.health.write();
            match health.state() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Shutdown => return Err(MonitorError::Shutdown),
                _ => health.transition(ConnectionState::Reconnecting)?,
            }
        }
        metrics::record_connection_state(ConnectionState::Reconnecting);

        let max_attempts = self.settings.max_reconnect_attempts;
        for attempt in 1..=max_attempts {
            // Drop any stale handle before retrying.
            let stale = self.session.write().take();
            if let Some(stale) = stale {
                stale.disconnect().await;
            }

            let delay = self.policy.delay_for_attempt(attempt);
            tracing::info!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis(),
                "reconnection attempt"
            );
            tokio::select! {
                () = self.cancel.cancelled() => return Err(MonitorError::Shutdown),
                () = tokio::time::sleep(delay) => {}
            }

            match self.establish().await {
                Ok(()) => {
                    self.health.write().record_reconnect();
                    metrics::record_reconnect();
                    tracing::info!(attempt, "reconnection successful");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnection attempt failed");
                    self.health.write().record_error(e.to_string());
                }
            }
        }

        {
            let mut health = self.health.write();
            let _ = health.transition(ConnectionState::Error);
        }
        metrics::record_connection_state(ConnectionState::Error);
        tracing::error!(max_attempts, "reconnection attempts exhausted");
        self.callbacks.notify_error(&MonitorError::ConnectionLost);
        Err(MonitorError::ReconnectExhausted(max_attempts))
    }

    /// Create and connect a fresh session, then publish it.
    ///
    /// Callers own the surrounding state bookkeeping on failure.
    async fn establish(&self) -> Result<(), MonitorError> {
        let session = self
            .factory
            .create()
            .await
            .map_err(MonitorError::ConnectFailed)?;
        session
            .connect()
            .await
            .map_err(MonitorError::ConnectFailed)?;

        // Transition before publishing the handle so a session can never be
        // exposed (or leaked) after a concurrent shutdown.
        {
            let mut health = self.health.write();
            health.transition(ConnectionState::Connected)?;
            health.record_connected();
        }
        *self.session.write() = Some(session);
        metrics::record_connection_state(ConnectionState::Connected);
        tracing::info!("gateway session established");
        self.callbacks.notify_connected();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Background checks
    // -------------------------------------------------------------------------

    /// Periodic liveness check; triggers recovery on failure.
    async fn liveness_loop(&self) {
        tracing::debug!("liveness loop started");
        let mut interval = tokio::time::interval(self.settings.heartbeat_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("liveness loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if !self.check_connection() {
                        tracing::warn!("connection check failed, attempting recovery");
                        if let Err(e) = self.reconnect().await {
                            tracing::error!(error = %e, "recovery failed");
                        }
                    }
                }
            }
        }
    }

    /// Periodic heartbeat probe; records latency and detects silent loss.
    async fn heartbeat_loop(&self) {
        tracing::debug!("heartbeat loop started");
        let mut interval = tokio::time::interval(self.settings.heartbeat_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("heartbeat loop cancelled");
                    break;
                }
                _ = interval.tick() => self.probe_heartbeat().await,
            }
        }
    }

    /// Whether the session is present, connected, and recently heartbeaten.
    fn check_connection(&self) -> bool {
        let session = self.session.read().clone();
        let Some(session) = session else {
            return false;
        };

        if self.health.read().state() != ConnectionState::Connected {
            return false;
        }

        if !session.is_connected() {
            tracing::warn!("session liveness predicate reports disconnected");
            let _ = self
                .health
                .write()
                .transition(ConnectionState::Disconnected);
            metrics::record_connection_state(ConnectionState::Disconnected);
            return false;
        }

        if let Some(age) = self.health.read().heartbeat_age()
            && age > self.settings.heartbeat_interval * 3
        {
            tracing::warn!(age_secs = age.as_secs(), "heartbeat is stale");
            return false;
        }

        true
    }

    /// Ping the session, recording latency or marking the connection lost.
    async fn probe_heartbeat(&self) {
        let session = self.session.read().clone();
        let Some(session) = session else {
            return;
        };
        if self.health.read().state() != ConnectionState::Connected {
            return;
        }

        let started = Instant::now();
        match session.ping().await {
            Ok(()) => {
                let latency = started.elapsed();
                self.health.write().record_heartbeat(latency);
                metrics::record_heartbeat_latency(latency);
            }
            Err(e) => {
                tracing::warn!(error = %e, "heartbeat detected connection loss");
                let mut health = self.health.write();
                health.record_error(e.to_string());
                let _ = health.transition(ConnectionState::Disconnected);
                drop(health);
                metrics::record_connection_state(ConnectionState::Disconnected);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Whether the state machine currently reports `Connected`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.health.read().state() == ConnectionState::Connected
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.health.read().state()
    }

    /// Serializable health snapshot.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.health.read().snapshot()
    }

    /// Borrow the live session handle.
    ///
    /// Returns `None` unless the state is `Connected`, which keeps callers
    /// from using a handle mid-recovery.
    #[must_use]
    pub fn connection(&self) -> Option<Arc<dyn GatewaySession>> {
        if self.is_connected() {
            self.session.read().clone()
        } else {
            None
        }
    }

    /// Count a message sent through the connection.
    pub fn record_message_sent(&self) {
        self.health.write().record_message_sent();
    }

    /// Count a message received from the connection.
    pub fn record_message_received(&self) {
        self.health.write().record_message_received();
    }

    // -------------------------------------------------------------------------
    // Callback registration
    // -------------------------------------------------------------------------

    /// Register the connected callback. Last registration wins.
    pub fn on_connected(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.callbacks.connected.write() = Some(Arc::new(callback));
    }

    /// Register the disconnected callback. Last registration wins.
    pub fn on_disconnected(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.callbacks.disconnected.write() = Some(Arc::new(callback));
    }

    /// Register the error callback. Last registration wins.
    pub fn on_error(&self, callback: impl Fn(&MonitorError) + Send + Sync + 'static) {
        *self.callbacks.error.write() = Some(Arc::new(callback));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use mockall::Sequence;

    use super::*;
    use crate::application::ports::{MockGatewaySession, MockSessionFactory};

    fn fast_settings() -> MonitorSettings {
        MonitorSettings {
            heartbeat_interval: Duration::from_millis(50),
            max_reconnect_attempts: 3,
            reconnect_delay_initial: Duration::from_millis(10),
            reconnect_delay_max: Duration::from_millis(100),
            ..MonitorSettings::default()
        }
    }

    fn live_session() -> Arc<dyn GatewaySession> {
        let mut session = MockGatewaySession::new();
        session.expect_connect().returning(|| Ok(()));
        session.expect_disconnect().returning(|| ());
        session.expect_is_connected().return_const(true);
        session.expect_ping().returning(|| Ok(()));
        Arc::new(session)
    }

    fn working_factory(expected_creates: usize) -> Arc<MockSessionFactory> {
        let mut factory = MockSessionFactory::new();
        factory
            .expect_create()
            .times(expected_creates)
            .returning(|| Ok(live_session()));
        Arc::new(factory)
    }

    #[tokio::test]
    async fn start_connects_and_reports_healthy() {
        let monitor = Arc::new(ConnectionMonitor::new(working_factory(1), fast_settings()));

        monitor.start().await.unwrap();
        assert!(monitor.is_connected());
        assert!(monitor.connection().is_some());

        let snapshot = monitor.health();
        assert_eq!(snapshot.state, "connected");
        assert!(snapshot.healthy);
        assert!(snapshot.uptime_secs.is_some());

        monitor.stop().await;
    }

    #[tokio::test]
    async fn start_failure_leaves_error_state() {
        let mut factory = MockSessionFactory::new();
        factory
            .expect_create()
            .times(1)
            .returning(|| Err(SessionError::ConnectFailed("refused".to_string())));

        let monitor = Arc::new(ConnectionMonitor::new(Arc::new(factory), fast_settings()));

        let err = monitor.start().await.unwrap_err();
        assert!(matches!(err, MonitorError::ConnectFailed(_)));
        assert_eq!(monitor.state(), ConnectionState::Error);
        assert!(monitor.connection().is_none());
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let monitor = Arc::new(ConnectionMonitor::new(working_factory(1), fast_settings()));

        monitor.start().await.unwrap();
        let err = monitor.start().await.unwrap_err();
        assert!(matches!(err, MonitorError::InvalidTransition(_)));
        assert!(monitor.is_connected(), "state unchanged by illegal start");

        monitor.stop().await;
    }

    #[tokio::test]
    async fn reconnect_is_idempotent_while_connected() {
        // Exactly one factory invocation: the reconnect must short-circuit.
        let monitor = Arc::new(ConnectionMonitor::new(working_factory(1), fast_settings()));

        monitor.start().await.unwrap();
        monitor.reconnect().await.unwrap();
        assert_eq!(monitor.health().reconnect_count, 0);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn reconnect_recovers_after_single_failure() {
        let mut factory = MockSessionFactory::new();
        let mut seq = Sequence::new();
        factory
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(SessionError::ConnectFailed("refused".to_string())));
        factory
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(live_session()));

        let monitor = Arc::new(ConnectionMonitor::new(Arc::new(factory), fast_settings()));

        monitor.reconnect().await.unwrap();
        assert!(monitor.is_connected());
        assert_eq!(monitor.health().reconnect_count, 1);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn reconnect_exhaustion_fires_error_callback() {
        let mut factory = MockSessionFactory::new();
        factory
            .expect_create()
            .times(3)
            .returning(|| Err(SessionError::ConnectFailed("refused".to_string())));

        let monitor = Arc::new(ConnectionMonitor::new(Arc::new(factory), fast_settings()));

        let errors = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&errors);
        monitor.on_error(move |e| {
            assert!(matches!(e, MonitorError::ConnectionLost));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let err = monitor.reconnect().await.unwrap_err();
        assert!(matches!(err, MonitorError::ReconnectExhausted(3)));
        assert_eq!(monitor.state(), ConnectionState::Error);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_is_terminal_and_idempotent() {
        let monitor = Arc::new(ConnectionMonitor::new(working_factory(1), fast_settings()));

        monitor.start().await.unwrap();
        monitor.stop().await;
        monitor.stop().await;

        assert_eq!(monitor.state(), ConnectionState::Shutdown);
        assert!(monitor.connection().is_none());
        assert!(matches!(
            monitor.reconnect().await,
            Err(MonitorError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn connected_callback_panic_is_swallowed() {
        let monitor = Arc::new(ConnectionMonitor::new(working_factory(1), fast_settings()));
        monitor.on_connected(|| panic!("listener bug"));

        monitor.start().await.unwrap();
        assert!(monitor.is_connected());

        monitor.stop().await;
    }

    #[tokio::test]
    async fn last_callback_registration_wins() {
        let monitor = Arc::new(ConnectionMonitor::new(working_factory(1), fast_settings()));

        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        {
            let hits = Arc::clone(&first);
            monitor.on_connected(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let hits = Arc::clone(&second);
            monitor.on_connected(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        monitor.start().await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn message_counters_flow_into_snapshot() {
        let monitor = Arc::new(ConnectionMonitor::new(working_factory(1), fast_settings()));
        monitor.start().await.unwrap();

        monitor.record_message_sent();
        monitor.record_message_received();
        monitor.record_message_received();

        let snapshot = monitor.health();
        assert_eq!(snapshot.messages_sent, 1);
        assert_eq!(snapshot.messages_received, 2);

        monitor.stop().await;
    }
}
