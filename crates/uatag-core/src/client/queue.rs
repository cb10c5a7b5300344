// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Hand-off queue between notification producers and the consumer.
//!
//! Producers push from any thread. The consumer drains once per cycle: the
//! whole backlog is taken under the lock and applied after the lock is
//! released, so pushes arriving mid-drain land in the next cycle. Every
//! action is applied exactly once; a failing or panicking action is logged
//! and counted without stopping the rest of the batch.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::ClientResult;
use crate::types::{DataType, DataValue, StatusCode, Value};

// =============================================================================
// PendingAction
// =============================================================================

/// One deferred tag update, created per delivered value.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    /// Position in the push order, assigned by the queue.
    pub sequence: u64,
    /// Tag display name.
    pub tag: String,
    /// Delivered value.
    pub value: Value,
    /// Source timestamp of the value.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Type observed on the wire.
    pub observed_type: DataType,
    /// Status delivered with the value.
    pub status: StatusCode,
}

impl PendingAction {
    /// Creates an action from a delivered value.
    pub fn new(tag: impl Into<String>, data_value: DataValue) -> Self {
        let observed_type = data_value.value.data_type();
        Self {
            sequence: 0,
            tag: tag.into(),
            value: data_value.value,
            source_timestamp: data_value.source_timestamp,
            observed_type,
            status: data_value.status,
        }
    }
}

// =============================================================================
// DrainReport
// =============================================================================

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions applied successfully.
    pub applied: usize,
    /// Actions that failed or panicked.
    pub failed: usize,
}

impl DrainReport {
    /// Returns the number of actions consumed.
    pub fn total(&self) -> usize {
        self.applied + self.failed
    }

    /// Returns `true` if nothing was queued.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

// =============================================================================
// ActionQueue
// =============================================================================

/// Multi-producer, single-consumer FIFO of [`PendingAction`]s.
#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: Mutex<VecDeque<PendingAction>>,
    next_sequence: AtomicU64,
    stats: QueueStats,
}

impl ActionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an action.
    pub fn push(&self, mut action: PendingAction) {
        let mut pending = self.pending.lock();
        // Sequence is taken under the lock so it matches queue order.
        action.sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        pending.push_back(action);
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of queued actions.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Removes every queued action and applies each one in push order.
    pub fn drain_all<F>(&self, mut apply: F) -> DrainReport
    where
        F: FnMut(&PendingAction) -> ClientResult<()>,
    {
        let batch = std::mem::take(&mut *self.pending.lock());
        let mut report = DrainReport::default();

        for action in &batch {
            match panic::catch_unwind(AssertUnwindSafe(|| apply(action))) {
                Ok(Ok(())) => report.applied += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(
                        tag = %action.tag,
                        sequence = action.sequence,
                        category = e.category(),
                        error = %e,
                        "Queued action failed"
                    );
                }
                Err(payload) => {
                    report.failed += 1;
                    tracing::error!(
                        tag = %action.tag,
                        sequence = action.sequence,
                        panic = panic_message(payload.as_ref()),
                        "Queued action panicked"
                    );
                }
            }
        }

        self.stats.applied.fetch_add(report.applied as u64, Ordering::Relaxed);
        self.stats.failed.fetch_add(report.failed as u64, Ordering::Relaxed);
        if !report.is_empty() {
            tracing::trace!(applied = report.applied, failed = report.failed, "Drained action queue");
        }
        report
    }

    /// Returns queue statistics.
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// =============================================================================
// QueueStats
// =============================================================================

/// Queue counters.
#[derive(Debug, Default)]
pub struct QueueStats {
    pushed: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
}

impl QueueStats {
    /// Total actions pushed.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Total actions applied.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Total actions that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
