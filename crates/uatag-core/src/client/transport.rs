// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol library contract.
//!
//! The core never talks to the wire directly. Everything it needs from the
//! protocol stack (sessions, subscriptions, monitored items, writes and
//! asynchronous notifications) goes through [`UaTransport`], so the
//! connection, dispatch and write logic can be exercised against a scripted
//! transport in tests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ClientConfig, SubscriptionSettings};
use crate::error::ClientResult;
use crate::types::{DataValue, NodeAddress, StatusCode, Value};

// =============================================================================
// Handles
// =============================================================================

/// Opaque handle of an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Opaque handle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u32);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Opaque handle of a monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitoredItemHandle(pub u32);

impl fmt::Display for MonitoredItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// Values delivered for one monitored item, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemNotification {
    /// Display name the item was registered with.
    pub display_name: String,
    /// Delivered values in arrival order.
    pub values: Vec<DataValue>,
}

impl MonitoredItemNotification {
    /// Creates a notification carrying a single value.
    pub fn single(display_name: impl Into<String>, value: DataValue) -> Self {
        Self {
            display_name: display_name.into(),
            values: vec![value],
        }
    }
}

/// Receiver of asynchronous notifications.
///
/// Called on the protocol library's own execution context, concurrently with
/// the consumer. Implementations must not block.
pub trait NotificationSink: Send + Sync {
    /// Handles one monitored item notification.
    fn on_notification(&self, notification: MonitoredItemNotification);
}

// =============================================================================
// WriteRequest
// =============================================================================

/// A single Value-attribute write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Target node.
    pub address: NodeAddress,
    /// Converted value.
    pub value: Value,
    /// Request timeout hint.
    pub timeout: Duration,
}

// =============================================================================
// UaTransport
// =============================================================================

/// Abstract protocol transport.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the connection supervisor and the
/// write path call into the transport from different tasks.
#[async_trait]
pub trait UaTransport: Send + Sync {
    /// Selects an endpoint matching the security settings and opens an
    /// activated session.
    async fn connect(&self, config: &ClientConfig) -> ClientResult<SessionHandle>;

    /// Returns `true` while the session is usable.
    fn is_session_connected(&self, session: SessionHandle) -> bool;

    /// Creates an enabled subscription whose notifications go to `sink`.
    async fn create_subscription(
        &self,
        session: SessionHandle,
        settings: &SubscriptionSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> ClientResult<SubscriptionHandle>;

    /// Adds a monitored item on the Value attribute of `address`.
    async fn create_monitored_item(
        &self,
        subscription: SubscriptionHandle,
        address: &NodeAddress,
        display_name: &str,
        sampling_interval: Duration,
    ) -> ClientResult<MonitoredItemHandle>;

    /// Submits a write and returns the per-node status results.
    async fn write(
        &self,
        session: SessionHandle,
        request: WriteRequest,
    ) -> ClientResult<Vec<StatusCode>>;

    /// Deletes a subscription on the server.
    async fn delete_subscription(
        &self,
        session: SessionHandle,
        subscription: SubscriptionHandle,
    ) -> ClientResult<()>;

    /// Closes a session.
    async fn close(&self, session: SessionHandle) -> ClientResult<()>;

    /// Returns the transport name for logging.
    fn name(&self) -> &str;
}
