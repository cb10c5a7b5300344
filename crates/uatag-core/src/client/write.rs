// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Validated writes.
//!
//! A write checks, in order: live connection, known tag, known address,
//! convertible value. It then submits a single Value-attribute write and
//! expects exactly one Good status back. Writes are at-most-once and never
//! touch the tag cache; the new value shows up when the server notifies it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::connection::ConnectionManager;
use crate::client::conversion::convert;
use crate::client::transport::WriteRequest;
use crate::error::{ClientError, ClientResult, ProtocolError};
use crate::registry::TagRegistry;
use crate::resolver::AddressResolver;
use crate::types::StatusCode;

/// Validates, converts and submits tag writes.
#[derive(Debug)]
pub struct WriteCoordinator {
    registry: Arc<TagRegistry>,
    resolver: Arc<AddressResolver>,
    connection: Arc<ConnectionManager>,
    stats: WriteStats,
}

impl WriteCoordinator {
    /// Creates a write coordinator.
    pub fn new(
        registry: Arc<TagRegistry>,
        resolver: Arc<AddressResolver>,
        connection: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            registry,
            resolver,
            connection,
            stats: WriteStats::default(),
        }
    }

    /// Writes `raw_value` to the tag named `display_name`.
    ///
    /// Returns the Good status reported by the server.
    pub async fn submit_write(&self, display_name: &str, raw_value: &str) -> ClientResult<StatusCode> {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        let result = self.write_inner(display_name, raw_value).await;

        match &result {
            Ok(status) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                info!(tag = %display_name, value = %raw_value.trim(), %status, "Write succeeded");
            }
            Err(e) => {
                if matches!(e, ClientError::WriteRejected { .. }) {
                    self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                }
                e.log("write");
            }
        }
        result
    }

    async fn write_inner(&self, display_name: &str, raw_value: &str) -> ClientResult<StatusCode> {
        let session = self.connection.session().ok_or_else(ClientError::not_connected)?;

        // Snapshot read; the consumer may update the type concurrently.
        let data_type = self
            .registry
            .data_type(display_name)
            .ok_or_else(|| ClientError::unknown_tag(display_name))?;

        let address = self
            .resolver
            .resolve(display_name)
            .cloned()
            .ok_or_else(|| ClientError::unknown_address(display_name))?;

        let value = convert(raw_value, data_type)?;
        debug!(tag = %display_name, node_id = %address, %data_type, ?value, "Write value converted");

        let timeout = self.connection.config().write_timeout;
        let request = WriteRequest {
            address: address.clone(),
            value,
            timeout,
        };

        debug!(tag = %display_name, node_id = %address, %session, "Submitting write");
        let results = tokio::time::timeout(timeout, self.connection.transport().write(session, request))
            .await
            .map_err(|_| ProtocolError::timeout("write", timeout))??;

        match results.first() {
            None => {
                warn!(tag = %display_name, node_id = %address, "Write returned no results");
                Err(ClientError::no_results("write"))
            }
            Some(status) if status.is_good() => Ok(*status),
            Some(status) => Err(ClientError::write_rejected(address.to_string(), *status)),
        }
    }

    /// Returns write statistics.
    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }
}

// =============================================================================
// WriteStats
// =============================================================================

/// Write counters.
#[derive(Debug, Default)]
pub struct WriteStats {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl WriteStats {
    /// Writes submitted.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Writes the server accepted.
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Writes the server rejected with a status.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Writes that failed before or without a server status.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
