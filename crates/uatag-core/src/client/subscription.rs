// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription dispatcher.
//!
//! On every fresh session the dispatcher creates one subscription with one
//! monitored item per addressable tag. Notifications arriving on the
//! protocol library's context are turned into [`PendingAction`]s and pushed
//! onto the [`ActionQueue`]; tag state is never touched here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::queue::{ActionQueue, PendingAction};
use crate::client::transport::{
    MonitoredItemNotification, NotificationSink, SessionHandle, SubscriptionHandle, UaTransport,
};
use crate::config::SubscriptionSettings;
use crate::error::{ClientResult, ConnectionError};
use crate::registry::TagRegistry;
use crate::resolver::AddressResolver;
use crate::types::NodeAddress;

// =============================================================================
// QueueSink
// =============================================================================

/// Forwards every delivered value to the action queue, in arrival order.
struct QueueSink {
    queue: Arc<ActionQueue>,
    stats: Arc<DispatchStats>,
}

impl NotificationSink for QueueSink {
    fn on_notification(&self, notification: MonitoredItemNotification) {
        let MonitoredItemNotification {
            display_name,
            values,
        } = notification;

        for value in values {
            self.queue.push(PendingAction::new(display_name.clone(), value));
            self.stats.notifications.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// =============================================================================
// SetupReport
// =============================================================================

/// Result of [`SubscriptionDispatcher::setup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    /// The created subscription.
    pub subscription: SubscriptionHandle,
    /// Names with a monitored item.
    pub monitored: Vec<String>,
    /// Names skipped because they have no address or item creation failed.
    pub skipped: Vec<String>,
}

// =============================================================================
// SubscriptionDispatcher
// =============================================================================

/// Registers monitored items and routes notifications to the queue.
pub struct SubscriptionDispatcher {
    registry: Arc<TagRegistry>,
    resolver: Arc<AddressResolver>,
    queue: Arc<ActionQueue>,
    settings: SubscriptionSettings,
    stats: Arc<DispatchStats>,
}

impl SubscriptionDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        registry: Arc<TagRegistry>,
        resolver: Arc<AddressResolver>,
        queue: Arc<ActionQueue>,
        settings: SubscriptionSettings,
    ) -> Self {
        Self {
            registry,
            resolver,
            queue,
            settings,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Subscribes every resolvable tag, plus the extra monitored nodes, on a
    /// live session.
    ///
    /// Tags without an address and items the server refuses are logged and
    /// skipped; only a failure to create the subscription itself is an error.
    pub async fn setup(
        &self,
        transport: &dyn UaTransport,
        session: SessionHandle,
    ) -> ClientResult<SetupReport> {
        self.stats.setups.fetch_add(1, Ordering::Relaxed);

        let sink: Arc<dyn NotificationSink> = Arc::new(QueueSink {
            queue: Arc::clone(&self.queue),
            stats: Arc::clone(&self.stats),
        });

        let subscription = transport
            .create_subscription(session, &self.settings, sink)
            .await
            .map_err(|e| ConnectionError::subscription_failed(e.to_string()))?;

        debug!(
            %session,
            %subscription,
            publishing_interval_ms = self.settings.publishing_interval.as_millis() as u64,
            "Subscription created"
        );

        let mut targets: Vec<(String, NodeAddress)> = Vec::new();
        let mut skipped = Vec::new();

        for name in self.registry.names() {
            match self.resolver.resolve(&name) {
                Some(address) => targets.push((name, address.clone())),
                None => {
                    warn!(tag = %name, "No node address for tag, not subscribing");
                    skipped.push(name);
                }
            }
        }
        for node in &self.settings.monitored_nodes {
            targets.push((node.display_name.clone(), node.address.clone()));
        }

        let mut monitored = Vec::with_capacity(targets.len());
        for (name, address) in targets {
            match transport
                .create_monitored_item(subscription, &address, &name, self.settings.sampling_interval)
                .await
            {
                Ok(item) => {
                    debug!(tag = %name, node_id = %address, %item, "Monitored item created");
                    monitored.push(name);
                }
                Err(e) => {
                    warn!(tag = %name, node_id = %address, error = %e, "Failed to create monitored item");
                    skipped.push(name);
                }
            }
        }

        self.stats
            .monitored_items
            .store(monitored.len() as u64, Ordering::Relaxed);
        info!(
            %subscription,
            monitored_items = monitored.len(),
            skipped = skipped.len(),
            "Subscribed to {} tags",
            monitored.len()
        );

        Ok(SetupReport {
            subscription,
            monitored,
            skipped,
        })
    }

    /// Returns dispatcher statistics.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

impl std::fmt::Debug for SubscriptionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionDispatcher")
            .field("tags", &self.registry.len())
            .field("addresses", &self.resolver.len())
            .field("settings", &self.settings)
            .finish()
    }
}

// =============================================================================
// DispatchStats
// =============================================================================

/// Dispatcher counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    setups: AtomicU64,
    monitored_items: AtomicU64,
    notifications: AtomicU64,
}

impl DispatchStats {
    /// Number of times `setup` ran.
    pub fn setups(&self) -> u64 {
        self.setups.load(Ordering::Relaxed)
    }

    /// Monitored items created by the last setup.
    pub fn monitored_items(&self) -> u64 {
        self.monitored_items.load(Ordering::Relaxed)
    }

    /// Values forwarded to the queue.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, DataValue, Value};

    #[test]
    fn test_sink_pushes_every_value_in_order() {
        let queue = Arc::new(ActionQueue::new());
        let stats = Arc::new(DispatchStats::default());
        let sink = QueueSink {
            queue: Arc::clone(&queue),
            stats: Arc::clone(&stats),
        };

        sink.on_notification(MonitoredItemNotification {
            display_name: "DriveX.fActPosition".into(),
            values: vec![
                DataValue::now(Value::Double(1.0)),
                DataValue::now(Value::Double(2.0)),
            ],
        });
        sink.on_notification(MonitoredItemNotification::single(
            "Auto_Mode",
            DataValue::now(Value::Boolean(true)),
        ));

        let mut seen = Vec::new();
        queue.drain_all(|a| {
            seen.push((a.tag.clone(), a.observed_type));
            Ok(())
        });
        assert_eq!(
            seen,
            vec![
                ("DriveX.fActPosition".to_string(), DataType::Double),
                ("DriveX.fActPosition".to_string(), DataType::Double),
                ("Auto_Mode".to_string(), DataType::Boolean),
            ]
        );
        assert_eq!(stats.notifications(), 3);
    }
}
