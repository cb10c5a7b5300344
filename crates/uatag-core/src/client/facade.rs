// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Embedding facade.
//!
//! [`TagClient`] wires the registry, resolver, queue, dispatcher,
//! connection manager and write coordinator together. The host drives it
//! from a single consumer context:
//!
//! ```rust,ignore
//! let client = TagClient::new(config, catalog, transport);
//! client.add_listener(Arc::new(MyRenderer));
//! let _ = client.start().await;
//!
//! loop {
//!     client.drain();
//!     // host frame / cycle work, e.g. client.write("Auto_Mode", "true").await
//! }
//!
//! client.shutdown().await;
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::catalog::TagCatalog;
use crate::client::connection::{ConnectionManager, ConnectionState, ConnectionStats};
use crate::client::queue::{ActionQueue, DrainReport, PendingAction, QueueStats};
use crate::client::subscription::SubscriptionDispatcher;
use crate::client::transport::UaTransport;
use crate::client::write::{WriteCoordinator, WriteStats};
use crate::config::{ClientConfig, UnseenTagPolicy};
use crate::error::{ClientError, ClientResult};
use crate::registry::{TagRegistry, Upsert};
use crate::resolver::AddressResolver;
use crate::types::{format_timestamp, DataType, StatusCode, Tag};

// =============================================================================
// Listeners
// =============================================================================

/// Receives one event per applied update, on the consumer context.
pub trait TagUpdateListener: Send + Sync {
    /// Called with the updated tag.
    fn on_tag_updated(&self, tag: &Tag);
}

impl<F> TagUpdateListener for F
where
    F: Fn(&Tag) + Send + Sync,
{
    fn on_tag_updated(&self, tag: &Tag) {
        self(tag)
    }
}

/// Listener forwarding updates into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<Tag>,
}

impl ChannelListener {
    /// Creates the listener and its receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Tag>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TagUpdateListener for ChannelListener {
    fn on_tag_updated(&self, tag: &Tag) {
        if self.sender.send(tag.clone()).is_err() {
            tracing::debug!(tag = %tag.display_name, "Update receiver dropped");
        }
    }
}

// =============================================================================
// TagClient
// =============================================================================

/// Tag-oriented OPC UA client.
pub struct TagClient {
    registry: Arc<TagRegistry>,
    resolver: Arc<AddressResolver>,
    queue: Arc<ActionQueue>,
    dispatcher: Arc<SubscriptionDispatcher>,
    connection: Arc<ConnectionManager>,
    writer: WriteCoordinator,
    listeners: RwLock<Vec<Arc<dyn TagUpdateListener>>>,
    unseen_tags: UnseenTagPolicy,
}

impl TagClient {
    /// Builds a client. No connection is made until [`start`](Self::start).
    pub fn new(config: ClientConfig, catalog: TagCatalog, transport: Arc<dyn UaTransport>) -> Self {
        let registry = Arc::new(catalog.registry());
        let resolver = Arc::new(catalog.resolver());
        let queue = Arc::new(ActionQueue::new());

        let dispatcher = Arc::new(SubscriptionDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&resolver),
            Arc::clone(&queue),
            config.subscription.clone(),
        ));

        let unseen_tags = config.unseen_tags;
        let connection = Arc::new(ConnectionManager::new(
            config,
            transport,
            Arc::clone(&dispatcher),
        ));

        let writer = WriteCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&resolver),
            Arc::clone(&connection),
        );

        tracing::debug!(
            tags = registry.len(),
            addresses = resolver.len(),
            "Tag client created"
        );

        Self {
            registry,
            resolver,
            queue,
            dispatcher,
            connection,
            writer,
            listeners: RwLock::new(Vec::new()),
            unseen_tags,
        }
    }

    /// Makes the first connection attempt.
    ///
    /// A failure is not fatal: the reconnect supervisor keeps trying, and the
    /// error is only returned so the host can report it.
    pub async fn start(&self) -> ClientResult<()> {
        self.connection.connect().await
    }

    /// Registers an update listener.
    pub fn add_listener(&self, listener: Arc<dyn TagUpdateListener>) {
        self.listeners.write().push(listener);
    }

    /// Applies every queued notification to the registry and fires one
    /// update event per applied action. Call once per consumer cycle.
    pub fn drain(&self) -> DrainReport {
        self.queue.drain_all(|action| self.apply(action))
    }

    fn apply(&self, action: &PendingAction) -> ClientResult<()> {
        let known_type = self.registry.data_type(&action.tag);

        if known_type.is_none() && self.unseen_tags == UnseenTagPolicy::Reject {
            return Err(ClientError::unknown_tag(&action.tag));
        }

        // An empty value carries no type information; keep the one we have.
        let data_type = if action.value.is_null() {
            known_type.unwrap_or(DataType::Variant)
        } else {
            action.observed_type
        };

        if action.status != StatusCode::GOOD {
            tracing::debug!(tag = %action.tag, status = %action.status, "Applying non-Good value");
        }

        let (tag, outcome) = self.registry.upsert(
            &action.tag,
            action.value.to_string(),
            format_timestamp(action.source_timestamp),
            data_type,
        );
        if outcome == Upsert::Created {
            warn!(tag = %tag.display_name, data_type = %tag.data_type, "Tag not in catalog, registered from notification");
        }

        // Snapshot so a listener may register another one.
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.on_tag_updated(&tag);
        }
        Ok(())
    }

    /// Validates, converts and writes a value. The cache is not updated.
    pub async fn write(&self, display_name: &str, raw_value: &str) -> ClientResult<StatusCode> {
        self.writer.submit_write(display_name, raw_value).await
    }

    /// Stops reconnecting and closes the session. Idempotent.
    pub async fn shutdown(&self) {
        self.connection.shutdown().await
    }

    /// Returns the connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns a receiver observing state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe_state()
    }

    /// Returns the tag registry.
    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Returns the address table.
    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Returns a snapshot of a tag.
    pub fn tag(&self, name: &str) -> Option<Tag> {
        self.registry.find(name)
    }

    /// Returns the connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Returns the subscription dispatcher.
    pub fn dispatcher(&self) -> &SubscriptionDispatcher {
        &self.dispatcher
    }

    /// Returns connection statistics.
    pub fn connection_stats(&self) -> &ConnectionStats {
        self.connection.stats()
    }

    /// Returns queue statistics.
    pub fn queue_stats(&self) -> &QueueStats {
        self.queue.stats()
    }

    /// Returns write statistics.
    pub fn write_stats(&self) -> &WriteStats {
        self.writer.stats()
    }

    /// Returns the number of notifications waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl std::fmt::Debug for TagClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagClient")
            .field("tags", &self.registry.len())
            .field("state", &self.state())
            .field("pending", &self.queue.len())
            .finish()
    }
}
