// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection lifecycle and the reconnect supervisor.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!                              │                   │ liveness lost
//!                              │ error             ▼
//!                              └──────────▶ Reconnecting ──tick──▶ Connecting
//! ```
//!
//! A failed connect never propagates as fatal: the manager moves to
//! `Reconnecting` and a supervisor task retries on every tick of the
//! [`ReconnectPolicy`]. The supervisor also polls liveness while connected.
//! It runs until [`ConnectionManager::shutdown`], or until a configured
//! attempt limit is exhausted, in which case the state settles on
//! `Disconnected`.
//!
//! [`ReconnectPolicy`]: crate::config::ReconnectPolicy

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::client::subscription::SubscriptionDispatcher;
use crate::client::transport::{SessionHandle, SubscriptionHandle, UaTransport};
use crate::config::ClientConfig;
use crate::error::{ClientResult, ConnectionError};

// =============================================================================
// ConnectionState
// =============================================================================

/// State of the client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session and no attempt in progress.
    #[default]
    Disconnected,
    /// An attempt is in progress.
    Connecting,
    /// A live session with an active subscription.
    Connected,
    /// Waiting for the next supervisor tick after a failure or a lost session.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` if connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the state is transitional.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

type StateCallback = Box<dyn Fn(ConnectionState, ConnectionState) + Send + Sync>;

#[derive(Debug, Default)]
struct Handles {
    session: Option<SessionHandle>,
    subscription: Option<SubscriptionHandle>,
}

// =============================================================================
// Shared State
// =============================================================================

struct Shared {
    config: ClientConfig,
    transport: Arc<dyn UaTransport>,
    dispatcher: Arc<SubscriptionDispatcher>,
    handles: Mutex<Handles>,
    state: watch::Sender<ConnectionState>,
    on_state_change: Mutex<Option<StateCallback>>,
    /// Serializes connect attempts and shutdown.
    connect_lock: tokio::sync::Mutex<()>,
    consecutive_failures: AtomicU32,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: AtomicBool,
    stats: ConnectionStats,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, new_state: ConnectionState) {
        let old_state = self.state.send_replace(new_state);

        if old_state != new_state {
            trace!(
                old_state = %old_state,
                new_state = %new_state,
                "Connection state changed"
            );

            if let Some(ref callback) = *self.on_state_change.lock() {
                callback(old_state, new_state);
            }
        }
    }

    fn failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn session_alive(&self) -> bool {
        let session = self.handles.lock().session;
        session.is_some_and(|s| self.transport.is_session_connected(s))
    }

    /// One connection attempt. Absorbs failures into the state machine and
    /// returns them for reporting only.
    async fn connect(&self) -> ClientResult<()> {
        let _guard = self.connect_lock.lock().await;

        if self.is_shutting_down() {
            return Err(ConnectionError::ShuttingDown.into());
        }
        if self.state().is_connected() && self.session_alive() {
            return Ok(());
        }
        // Retrying cannot repair a bad configuration.
        if let Err(e) = self.config.validate() {
            e.log("connect");
            self.set_state(ConnectionState::Disconnected);
            return Err(e);
        }

        let attempt = self.failures() + 1;
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);
        self.set_state(ConnectionState::Connecting);
        info!(
            endpoint = %self.config.endpoint,
            transport = self.transport.name(),
            attempt,
            "Connecting to OPC UA server"
        );

        match self.establish().await {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.stats.successes.fetch_add(1, Ordering::Relaxed);
                info!(endpoint = %self.config.endpoint, attempt, "Connected to OPC UA server");
                Ok(())
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                e.log("connect");

                if self.config.reconnect.is_exhausted(failures) {
                    error!(
                        endpoint = %self.config.endpoint,
                        failures,
                        "Reconnect attempts exhausted, giving up"
                    );
                    self.set_state(ConnectionState::Disconnected);
                } else {
                    let delay = self.config.reconnect.delay_for(failures);
                    warn!(
                        endpoint = %self.config.endpoint,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "Connection failed, will retry"
                    );
                    self.set_state(ConnectionState::Reconnecting);
                }
                Err(e)
            }
        }
    }

    /// Opens a session and runs subscription setup on it. The state only
    /// becomes `Connected` once setup has succeeded.
    async fn establish(&self) -> ClientResult<()> {
        let session = self.transport.connect(&self.config).await?;
        self.handles.lock().session = Some(session);

        match self.dispatcher.setup(self.transport.as_ref(), session).await {
            Ok(report) => {
                self.handles.lock().subscription = Some(report.subscription);
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                self.handles.lock().session = None;
                if let Err(close_error) = self.transport.close(session).await {
                    debug!(%session, error = %close_error, "Failed to close session after setup failure");
                }
                Err(e)
            }
        }
    }

    /// Forgets handles of a session that is already gone.
    fn drop_handles(&self) -> Handles {
        std::mem::take(&mut *self.handles.lock())
    }
}

// =============================================================================
// ConnectionManager
// =============================================================================

/// Owns the session lifecycle and the reconnect supervisor.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Creates a manager. Nothing happens until [`connect`](Self::connect).
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn UaTransport>,
        dispatcher: Arc<SubscriptionDispatcher>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                dispatcher,
                handles: Mutex::new(Handles::default()),
                state,
                on_state_change: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
                consecutive_failures: AtomicU32::new(0),
                shutdown_tx,
                shutting_down: AtomicBool::new(false),
                stats: ConnectionStats::default(),
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Returns a receiver observing every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Sets a callback invoked with `(old, new)` on every transition.
    pub fn set_state_change_callback<F>(&self, callback: F)
    where
        F: Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    {
        *self.shared.on_state_change.lock() = Some(Box::new(callback));
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<dyn UaTransport> {
        &self.shared.transport
    }

    /// Returns the live session, if connected.
    pub fn session(&self) -> Option<SessionHandle> {
        if !self.state().is_connected() {
            return None;
        }
        self.shared.handles.lock().session
    }

    /// Returns the active subscription, if any.
    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        self.shared.handles.lock().subscription
    }

    /// Returns connection statistics.
    pub fn stats(&self) -> &ConnectionStats {
        &self.shared.stats
    }

    /// Returns `true` while the supervisor task is alive.
    pub fn supervisor_running(&self) -> bool {
        self.supervisor
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Makes one connection attempt and makes sure the supervisor runs.
    ///
    /// On success the state is `Connected` and the dispatcher has run its
    /// setup once for the new session. On failure the state is
    /// `Reconnecting` and the supervisor keeps retrying; the error is
    /// returned for reporting only. An invalid configuration leaves the
    /// state `Disconnected` and starts no supervisor.
    pub async fn connect(&self) -> ClientResult<()> {
        let result = self.shared.connect().await;
        if self.state() != ConnectionState::Disconnected {
            self.ensure_supervisor();
        }
        result
    }

    fn ensure_supervisor(&self) {
        if self.shared.is_shutting_down() {
            return;
        }

        let mut supervisor = self.supervisor.lock();
        if supervisor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let shutdown_rx = self.shared.shutdown_tx.subscribe();
        let shared = Arc::clone(&self.shared);
        *supervisor = Some(tokio::spawn(supervise(shared, shutdown_rx)));
    }

    /// Stops the supervisor, deletes the subscription and closes the session.
    ///
    /// Idempotent and safe when never connected. Errors from the transport
    /// are logged, never returned.
    pub async fn shutdown(&self) {
        let first = !self.shared.shutting_down.swap(true, Ordering::SeqCst);
        if first {
            info!(endpoint = %self.shared.config.endpoint, "Shutting down connection");
            let _ = self.shared.shutdown_tx.send(());
        }

        let supervisor = self.supervisor.lock().take();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reconnect supervisor terminated abnormally");
            }
        }

        let _guard = self.shared.connect_lock.lock().await;
        let Handles {
            session,
            subscription,
        } = self.shared.drop_handles();

        if let (Some(session), Some(subscription)) = (session, subscription) {
            match self.shared.transport.delete_subscription(session, subscription).await {
                Ok(()) => debug!(%subscription, "Subscription deleted"),
                Err(e) => e.log("delete_subscription"),
            }
        }
        if let Some(session) = session {
            match self.shared.transport.close(session).await {
                Ok(()) => info!(%session, "Session closed"),
                Err(e) => e.log("close_session"),
            }
        }

        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.config.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Supervisor
// =============================================================================

async fn supervise(shared: Arc<Shared>, mut shutdown_rx: broadcast::Receiver<()>) {
    debug!("Reconnect supervisor started");

    loop {
        if shared.is_shutting_down() {
            break;
        }

        let delay = shared.config.reconnect.delay_for(shared.failures());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.recv() => break,
        }

        if shared.is_shutting_down() {
            break;
        }
        if shared.state().is_connected() && shared.session_alive() {
            continue;
        }

        if shared.state().is_connected() {
            shared.stats.liveness_losses.fetch_add(1, Ordering::Relaxed);
            let stale = shared.drop_handles();
            warn!(
                endpoint = %shared.config.endpoint,
                session = ?stale.session,
                "Session lost, reconnecting"
            );
            shared.set_state(ConnectionState::Reconnecting);
        }

        // Not raced against shutdown: an attempt cancelled mid-setup would
        // orphan its session and subscription. Shutdown waits for it instead
        // and releases whatever it opened.
        let result = shared.connect().await;
        if result.is_err() && shared.state() == ConnectionState::Disconnected {
            break;
        }
    }

    debug!("Reconnect supervisor stopped");
}

// =============================================================================
// ConnectionStats
// =============================================================================

/// Connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    liveness_losses: AtomicU64,
}

impl ConnectionStats {
    /// Connection attempts made.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Successful connections.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Failed connection attempts.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Sessions found dead by the supervisor.
    pub fn liveness_losses(&self) -> u64 {
        self.liveness_losses.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::client::queue::ActionQueue;
    use crate::error::ClientError;
    use crate::client::transport::{
        MonitoredItemHandle, NotificationSink, WriteRequest,
    };
    use crate::config::SubscriptionSettings;
    use crate::registry::TagRegistry;
    use crate::resolver::AddressResolver;
    use crate::types::{NodeAddress, StatusCode};

    #[derive(Default)]
    struct FlakyTransport {
        fail_first: usize,
        connects: AtomicUsize,
        closes: AtomicUsize,
        alive: AtomicBool,
    }

    #[async_trait]
    impl UaTransport for FlakyTransport {
        async fn connect(&self, _config: &ClientConfig) -> ClientResult<SessionHandle> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(ConnectionError::session_failed("opc.tcp://test:4840", "refused").into());
            }
            self.alive.store(true, Ordering::SeqCst);
            Ok(SessionHandle(n as u64))
        }

        fn is_session_connected(&self, _session: SessionHandle) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn create_subscription(
            &self,
            _session: SessionHandle,
            _settings: &SubscriptionSettings,
            _sink: Arc<dyn NotificationSink>,
        ) -> ClientResult<SubscriptionHandle> {
            Ok(SubscriptionHandle(1))
        }

        async fn create_monitored_item(
            &self,
            _subscription: SubscriptionHandle,
            _address: &NodeAddress,
            _display_name: &str,
            _sampling_interval: Duration,
        ) -> ClientResult<MonitoredItemHandle> {
            Ok(MonitoredItemHandle(1))
        }

        async fn write(&self, _session: SessionHandle, _request: WriteRequest) -> ClientResult<Vec<StatusCode>> {
            Ok(vec![StatusCode::GOOD])
        }

        async fn delete_subscription(&self, _s: SessionHandle, _sub: SubscriptionHandle) -> ClientResult<()> {
            Ok(())
        }

        async fn close(&self, _session: SessionHandle) -> ClientResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn manager(transport: Arc<FlakyTransport>, config: ClientConfig) -> ConnectionManager {
        let registry = Arc::new(TagRegistry::new());
        let dispatcher = Arc::new(SubscriptionDispatcher::new(
            registry,
            Arc::new(AddressResolver::new()),
            Arc::new(ActionQueue::new()),
            config.subscription.clone(),
        ));
        ConnectionManager::new(config, transport, dispatcher)
    }

    #[test]
    fn test_connection_state() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Reconnecting.is_transitioning());
        assert!(!ConnectionState::Disconnected.is_transitioning());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_success() {
        let transport = Arc::new(FlakyTransport::default());
        let manager = manager(Arc::clone(&transport), ClientConfig::default());

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.session(), Some(SessionHandle(0)));
        assert_eq!(manager.subscription(), Some(SubscriptionHandle(1)));
        assert!(manager.supervisor_running());

        manager.shutdown().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.supervisor_running());
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_connect() {
        let transport = Arc::new(FlakyTransport::default());
        let manager = manager(Arc::clone(&transport), ClientConfig::default());
        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 0);
        assert!(matches!(
            manager.connect().await,
            Err(ClientError::Connection(ConnectionError::ShuttingDown))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_moves_to_reconnecting() {
        let transport = Arc::new(FlakyTransport {
            fail_first: 1,
            ..Default::default()
        });
        let manager = manager(Arc::clone(&transport), ClientConfig::default());

        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert!(manager.supervisor_running());

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.stats().attempts(), 2);
        assert_eq!(manager.stats().failures(), 1);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_starts_no_supervisor() {
        let transport = Arc::new(FlakyTransport::default());
        let config = ClientConfig::new("http://wrong-scheme");
        let manager = manager(Arc::clone(&transport), config);

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Connection(ConnectionError::InvalidEndpoint { .. })
                | ClientError::Connection(ConnectionError::InvalidConfiguration { .. })
        ));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.supervisor_running());
        assert_eq!(manager.stats().attempts(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_connected_only_after_setup() {
        let transport = Arc::new(FlakyTransport::default());
        let manager = manager(Arc::clone(&transport), ClientConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let observed = Arc::clone(&manager.shared);
        manager.set_state_change_callback(move |_old, new| {
            let subscribed = observed.handles.lock().subscription.is_some();
            recorder.lock().push((new, subscribed));
        });

        manager.connect().await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                (ConnectionState::Connecting, false),
                (ConnectionState::Connected, true),
            ]
        );
        manager.shutdown().await;
    }
}
