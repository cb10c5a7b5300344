// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Transport
//!
//! [`MockTransport`] stands in for the OPC UA stack. It can:
//!
//! - fail the next N connects, or every connect
//! - drop live sessions to simulate a lost server
//! - refuse subscriptions or single monitored items
//! - return scripted write statuses, empty results or transport errors
//! - deliver notifications through the sink registered by the client
//! - record connects (with their instant), writes, closes and deletions

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use uatag_core::client::{
    MonitoredItemHandle, MonitoredItemNotification, NotificationSink, SessionHandle,
    SubscriptionHandle, UaTransport, WriteRequest,
};
use uatag_core::{
    ClientConfig, ClientError, ClientResult, ConnectionError, DataValue, NodeAddress, StatusCode,
    SubscriptionSettings, Value,
};

// =============================================================================
// Scripted Outcomes
// =============================================================================

/// Scripted result of one write call.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The server answers with this status.
    Status(StatusCode),
    /// The server answers with an empty result list.
    Empty,
    /// The call fails at the transport level.
    Error(String),
}

/// One created monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemRecord {
    /// Subscription the item belongs to.
    pub subscription: SubscriptionHandle,
    /// Display name it was registered with.
    pub display_name: String,
    /// Node address.
    pub address: NodeAddress,
}

struct SinkEntry {
    session: SessionHandle,
    subscription: SubscriptionHandle,
    sink: Arc<dyn NotificationSink>,
}

#[derive(Default)]
struct MockState {
    fail_connects: u32,
    fail_all_connects: bool,
    fail_subscription: bool,
    refused_items: HashSet<String>,
    live_sessions: HashSet<SessionHandle>,
    sinks: Vec<SinkEntry>,
    items: Vec<MonitoredItemRecord>,
    write_script: VecDeque<WriteOutcome>,
    write_delay: Option<Duration>,
    item_delay: Option<Duration>,
    writes: Vec<WriteRequest>,
    connect_times: Vec<Instant>,
    closed_sessions: Vec<SessionHandle>,
    deleted_subscriptions: Vec<SubscriptionHandle>,
}

// =============================================================================
// MockTransport
// =============================================================================

/// Scriptable in-memory transport.
pub struct MockTransport {
    state: Mutex<MockState>,
    next_session: AtomicU64,
    next_subscription: AtomicU32,
    next_item: AtomicU32,
    subscriptions_created: AtomicU64,
}

impl MockTransport {
    /// Creates a transport that accepts everything.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_session: AtomicU64::new(1),
            next_subscription: AtomicU32::new(1),
            next_item: AtomicU32::new(1),
            subscriptions_created: AtomicU64::new(0),
        }
    }

    /// Creates a shared transport.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // -------------------------------------------------------------------------
    // Failure injection
    // -------------------------------------------------------------------------

    /// Makes the next `count` connects fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.state.lock().fail_connects = count;
    }

    /// Makes every connect fail until reset.
    pub fn fail_all_connects(&self, fail: bool) {
        self.state.lock().fail_all_connects = fail;
    }

    /// Makes subscription creation fail until reset.
    pub fn fail_subscription(&self, fail: bool) {
        self.state.lock().fail_subscription = fail;
    }

    /// Makes the server refuse a monitored item for `display_name`.
    pub fn refuse_item(&self, display_name: impl Into<String>) {
        self.state.lock().refused_items.insert(display_name.into());
    }

    /// Marks every live session as lost.
    pub fn drop_sessions(&self) {
        self.state.lock().live_sessions.clear();
    }

    /// Queues a write outcome. Unscripted writes answer Good.
    pub fn script_write(&self, outcome: WriteOutcome) {
        self.state.lock().write_script.push_back(outcome);
    }

    /// Delays every write by `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = Some(delay);
    }

    /// Delays every monitored item creation by `delay`.
    pub fn set_item_delay(&self, delay: Duration) {
        self.state.lock().item_delay = Some(delay);
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    /// Delivers values for `display_name` through the newest subscription.
    ///
    /// Returns `false` when no subscription exists.
    pub fn notify_values(&self, display_name: &str, values: Vec<DataValue>) -> bool {
        let sink = self
            .state
            .lock()
            .sinks
            .last()
            .map(|entry| Arc::clone(&entry.sink));

        match sink {
            Some(sink) => {
                sink.on_notification(MonitoredItemNotification {
                    display_name: display_name.to_string(),
                    values,
                });
                true
            }
            None => false,
        }
    }

    /// Delivers a single Good value stamped now.
    pub fn notify(&self, display_name: &str, value: Value) -> bool {
        self.notify_values(display_name, vec![DataValue::now(value)])
    }

    // -------------------------------------------------------------------------
    // Recording
    // -------------------------------------------------------------------------

    /// Number of connect calls.
    pub fn connect_count(&self) -> usize {
        self.state.lock().connect_times.len()
    }

    /// Instants of every connect call, on the tokio clock.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.state.lock().connect_times.clone()
    }

    /// Number of subscriptions created.
    pub fn subscription_count(&self) -> u64 {
        self.subscriptions_created.load(Ordering::SeqCst)
    }

    /// Monitored items created so far.
    pub fn monitored_items(&self) -> Vec<MonitoredItemRecord> {
        self.state.lock().items.clone()
    }

    /// Display names of items on the newest subscription.
    pub fn monitored_names(&self) -> Vec<String> {
        let state = self.state.lock();
        let Some(current) = state.sinks.last().map(|entry| entry.subscription) else {
            return Vec::new();
        };
        state
            .items
            .iter()
            .filter(|item| item.subscription == current)
            .map(|item| item.display_name.clone())
            .collect()
    }

    /// Writes received, in order.
    pub fn writes(&self) -> Vec<WriteRequest> {
        self.state.lock().writes.clone()
    }

    /// Sessions closed by the client.
    pub fn closed_sessions(&self) -> Vec<SessionHandle> {
        self.state.lock().closed_sessions.clone()
    }

    /// Subscriptions deleted by the client.
    pub fn deleted_subscriptions(&self) -> Vec<SubscriptionHandle> {
        self.state.lock().deleted_subscriptions.clone()
    }

    /// Number of sessions currently alive.
    pub fn live_session_count(&self) -> usize {
        self.state.lock().live_sessions.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockTransport")
            .field("connects", &state.connect_times.len())
            .field("live_sessions", &state.live_sessions.len())
            .field("writes", &state.writes.len())
            .finish()
    }
}

#[async_trait]
impl UaTransport for MockTransport {
    async fn connect(&self, config: &ClientConfig) -> ClientResult<SessionHandle> {
        let mut state = self.state.lock();
        state.connect_times.push(Instant::now());

        if state.fail_all_connects || state.fail_connects > 0 {
            state.fail_connects = state.fail_connects.saturating_sub(1);
            return Err(ConnectionError::session_failed(&config.endpoint, "connection refused").into());
        }

        let session = SessionHandle(self.next_session.fetch_add(1, Ordering::SeqCst));
        state.live_sessions.insert(session);
        Ok(session)
    }

    fn is_session_connected(&self, session: SessionHandle) -> bool {
        self.state.lock().live_sessions.contains(&session)
    }

    async fn create_subscription(
        &self,
        session: SessionHandle,
        _settings: &SubscriptionSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> ClientResult<SubscriptionHandle> {
        let mut state = self.state.lock();
        if state.fail_subscription {
            return Err(ClientError::transport("BadTooManySubscriptions"));
        }
        if !state.live_sessions.contains(&session) {
            return Err(ClientError::not_connected());
        }

        let subscription = SubscriptionHandle(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        state.sinks.push(SinkEntry {
            session,
            subscription,
            sink,
        });
        self.subscriptions_created.fetch_add(1, Ordering::SeqCst);
        Ok(subscription)
    }

    async fn create_monitored_item(
        &self,
        subscription: SubscriptionHandle,
        address: &NodeAddress,
        display_name: &str,
        _sampling_interval: Duration,
    ) -> ClientResult<MonitoredItemHandle> {
        let delay = self.state.lock().item_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.refused_items.contains(display_name) {
            return Err(ClientError::transport(format!(
                "BadNodeIdUnknown for {}",
                address
            )));
        }

        state.items.push(MonitoredItemRecord {
            subscription,
            display_name: display_name.to_string(),
            address: address.clone(),
        });
        Ok(MonitoredItemHandle(self.next_item.fetch_add(1, Ordering::SeqCst)))
    }

    async fn write(
        &self,
        session: SessionHandle,
        request: WriteRequest,
    ) -> ClientResult<Vec<StatusCode>> {
        let delay = self.state.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if !state.live_sessions.contains(&session) {
            return Err(ClientError::not_connected());
        }
        state.writes.push(request);

        match state.write_script.pop_front() {
            None => Ok(vec![StatusCode::GOOD]),
            Some(WriteOutcome::Status(status)) => Ok(vec![status]),
            Some(WriteOutcome::Empty) => Ok(Vec::new()),
            Some(WriteOutcome::Error(message)) => Err(ClientError::transport(message)),
        }
    }

    async fn delete_subscription(
        &self,
        session: SessionHandle,
        subscription: SubscriptionHandle,
    ) -> ClientResult<()> {
        let mut state = self.state.lock();
        state
            .sinks
            .retain(|entry| !(entry.session == session && entry.subscription == subscription));
        state.deleted_subscriptions.push(subscription);
        Ok(())
    }

    async fn close(&self, session: SessionHandle) -> ClientResult<()> {
        let mut state = self.state.lock();
        state.live_sessions.remove(&session);
        state.closed_sessions.push(session);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
