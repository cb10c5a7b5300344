// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Client Harness
//!
//! A [`TagClient`] wired to a [`MockTransport`], with a channel listener
//! collecting every update event.

use std::sync::Arc;

use tokio::sync::mpsc;

use uatag_core::client::ChannelListener;
use uatag_core::{
    ClientConfig, ConnectionState, DataValue, DrainReport, Tag, TagCatalog, TagClient, UaTransport,
    Value,
};

use crate::common::fixtures::{CatalogFixtures, ConfigFixtures};
use crate::common::init_test_logging;
use crate::common::mocks::MockTransport;

/// A client over a mock transport.
pub struct ClientHarness {
    /// The mock transport.
    pub transport: Arc<MockTransport>,
    /// The client under test.
    pub client: Arc<TagClient>,
    updates: mpsc::UnboundedReceiver<Tag>,
}

impl ClientHarness {
    /// Robot cell catalog with the default test configuration. Not started.
    pub fn new() -> Self {
        Self::with(ConfigFixtures::client(), CatalogFixtures::robot_cell())
    }

    /// Custom configuration and catalog over a fresh transport. Not started.
    pub fn with(config: ClientConfig, catalog: TagCatalog) -> Self {
        Self::with_transport(config, catalog, MockTransport::shared())
    }

    /// Custom configuration, catalog and transport. Not started.
    pub fn with_transport(
        config: ClientConfig,
        catalog: TagCatalog,
        transport: Arc<MockTransport>,
    ) -> Self {
        init_test_logging();

        let dyn_transport: Arc<dyn UaTransport> = transport.clone();
        let client = Arc::new(TagClient::new(config, catalog, dyn_transport));
        let (listener, updates) = ChannelListener::new();
        client.add_listener(Arc::new(listener));

        Self {
            transport,
            client,
            updates,
        }
    }

    /// A started robot cell harness.
    ///
    /// # Panics
    ///
    /// Panics if the first connection attempt fails.
    pub async fn connected() -> Self {
        let harness = Self::new();
        harness.start().await;
        harness
    }

    /// Starts the client and asserts the connection came up.
    pub async fn start(&self) {
        self.client
            .start()
            .await
            .expect("first connection attempt should succeed");
        assert_eq!(self.client.state(), ConnectionState::Connected);
    }

    /// Delivers a Good value through the active subscription.
    pub fn notify(&self, name: &str, value: Value) {
        assert!(
            self.transport.notify(name, value),
            "no active subscription to deliver '{name}'"
        );
    }

    /// Delivers explicit values through the active subscription.
    pub fn notify_values(&self, name: &str, values: Vec<DataValue>) {
        assert!(
            self.transport.notify_values(name, values),
            "no active subscription to deliver '{name}'"
        );
    }

    /// Runs one consumer cycle.
    pub fn drain(&self) -> DrainReport {
        self.client.drain()
    }

    /// Returns every update event received so far.
    pub fn take_updates(&mut self) -> Vec<Tag> {
        let mut updates = Vec::new();
        while let Ok(tag) = self.updates.try_recv() {
            updates.push(tag);
        }
        updates
    }

    /// Returns the cached value of a tag.
    pub fn value(&self, name: &str) -> Option<String> {
        self.client.tag(name).map(|tag| tag.value)
    }

    /// Shuts the client down.
    pub async fn shutdown(&self) {
        self.client.shutdown().await
    }
}

impl Default for ClientHarness {
    fn default() -> Self {
        Self::new()
    }
}
