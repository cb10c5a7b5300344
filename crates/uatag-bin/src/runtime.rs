// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Host runtime.
//!
//! Plays the part of the consumer context: it owns the [`TagClient`], drains
//! the hand-off queue once per cycle, logs every applied update and issues the
//! requested writes once a session is up.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use uatag_config::{load_config, AppConfig};
use uatag_core::{ConnectionState, Tag, TagClient, TagUpdateListener, UaTransport};

use crate::cli::TagAssignment;
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// Transport Selection
// =============================================================================

/// Returns the production transport.
#[cfg(feature = "real-transport")]
pub fn default_transport() -> BinResult<Arc<dyn UaTransport>> {
    Ok(Arc::new(uatag_core::client::RealTransport::new()))
}

/// Returns the production transport.
#[cfg(not(feature = "real-transport"))]
pub fn default_transport() -> BinResult<Arc<dyn UaTransport>> {
    Err(BinError::init(
        "no OPC UA transport compiled in; rebuild with the `real-transport` feature",
    ))
}

// =============================================================================
// HostRuntime
// =============================================================================

/// Counters reported when the runtime stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Consumer cycles executed.
    pub cycles: u64,
    /// Updates applied across all drains.
    pub applied: u64,
    /// Updates that failed to apply.
    pub failed: u64,
    /// Writes the server accepted.
    pub writes_succeeded: u64,
    /// Writes rejected locally or by the server.
    pub writes_failed: u64,
}

/// Drives a [`TagClient`] until shutdown.
pub struct HostRuntime {
    config: AppConfig,
    transport: Arc<dyn UaTransport>,
    shutdown: ShutdownCoordinator,
    cycle: Duration,
    writes: Vec<TagAssignment>,
}

impl HostRuntime {
    /// Creates a runtime over the given transport.
    pub fn new(config: AppConfig, transport: Arc<dyn UaTransport>) -> Self {
        Self {
            config,
            transport,
            shutdown: ShutdownCoordinator::new(),
            cycle: Duration::from_millis(100),
            writes: Vec::new(),
        }
    }

    /// Sets the consumer cycle.
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }

    /// Queues writes to issue once connected.
    pub fn with_writes(mut self, writes: Vec<TagAssignment>) -> Self {
        self.writes = writes;
        self
    }

    /// Uses an existing shutdown coordinator.
    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs until shutdown is initiated.
    pub async fn run(self) -> BinResult<RunSummary> {
        let catalog = self.config.catalog()?;
        for name in self.config.unaddressed_tags() {
            warn!(tag = name, "Tag has no address; it can only be updated by notifications");
        }

        info!(
            endpoint = %self.config.client.endpoint,
            tags = catalog.len(),
            transport = self.transport.name(),
            "Starting uatag v{}",
            uatag_core::VERSION
        );

        let client = TagClient::new(self.config.client.clone(), catalog, self.transport);
        let listener: Arc<dyn TagUpdateListener> = Arc::new(log_update);
        client.add_listener(listener);

        if let Err(e) = client.start().await {
            if client.state() == ConnectionState::Disconnected {
                client.shutdown().await;
                return Err(e.into());
            }
            warn!(error = %e, "Initial connection failed, retrying in background");
        }

        let mut summary = RunSummary::default();
        let mut pending_writes = self.writes;
        let mut signal = self.shutdown.shutdown_signal();
        let mut ticker = tokio::time::interval(self.cycle);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = signal.wait() => break,
                _ = ticker.tick() => {}
            }

            summary.cycles += 1;
            let report = client.drain();
            summary.applied += report.applied as u64;
            summary.failed += report.failed as u64;

            if !pending_writes.is_empty() && client.state().is_connected() {
                for assignment in pending_writes.drain(..) {
                    match client.write(&assignment.name, &assignment.value).await {
                        Ok(status) => {
                            info!(tag = %assignment.name, value = %assignment.value, status = %status, "Write accepted");
                            summary.writes_succeeded += 1;
                        }
                        Err(e) => {
                            warn!(tag = %assignment.name, value = %assignment.value, error = %e, "Write failed");
                            summary.writes_failed += 1;
                        }
                    }
                }
            }
        }

        info!("Shutting down client");
        client.shutdown().await;

        // Updates delivered before the session closed still reach the host.
        let report = client.drain();
        summary.applied += report.applied as u64;
        summary.failed += report.failed as u64;

        if !pending_writes.is_empty() {
            warn!(count = pending_writes.len(), "Writes not issued before shutdown");
        }

        let stats = client.connection_stats();
        info!(
            cycles = summary.cycles,
            applied = summary.applied,
            connects = stats.successes(),
            liveness_losses = stats.liveness_losses(),
            "uatag shutdown complete"
        );

        Ok(summary)
    }
}

fn log_update(tag: &Tag) {
    info!(
        tag = %tag.display_name,
        value = %tag.value,
        data_type = %tag.data_type,
        source_timestamp = %tag.source_timestamp,
        "Tag updated"
    );
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder that loads the configuration and picks the transport.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<std::path::PathBuf>,
    config: Option<AppConfig>,
    transport: Option<Arc<dyn UaTransport>>,
    cycle: Option<Duration>,
    writes: Vec<TagAssignment>,
    shutdown: Option<ShutdownCoordinator>,
}

impl RuntimeBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the transport.
    pub fn transport(mut self, transport: Arc<dyn UaTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the consumer cycle.
    pub fn cycle(mut self, cycle: Duration) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Queues writes to issue once connected.
    pub fn writes(mut self, writes: Vec<TagAssignment>) -> Self {
        self.writes = writes;
        self
    }

    /// Uses an existing shutdown coordinator.
    pub fn shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<HostRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;
                load_config(&path).map_err(|e| {
                    BinError::from(e).with_context(format!("loading {}", path.display()))
                })?
            }
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let mut runtime = HostRuntime::new(config, transport).with_writes(self.writes);
        if let Some(cycle) = self.cycle {
            runtime = runtime.with_cycle(cycle);
        }
        if let Some(shutdown) = self.shutdown {
            runtime = runtime.with_shutdown(shutdown);
        }
        Ok(runtime)
    }
}
