// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           TagClient                              │
//! │            (drain / write / shutdown, update listeners)          │
//! └──────────────────────────────────────────────────────────────────┘
//!        │                      │                        │
//!        ▼                      ▼                        ▼
//! ┌───────────────┐   ┌───────────────────┐   ┌────────────────────┐
//! │  ActionQueue  │◄──│ SubscriptionDisp. │   │  WriteCoordinator  │
//! │ (hand-off)    │   │ (monitored items) │   │ (validated writes) │
//! └───────────────┘   └───────────────────┘   └────────────────────┘
//!                              ▲                        │
//!                              │                        ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       ConnectionManager                          │
//! │            (state machine, reconnect supervisor)                 │
//! └──────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UaTransport                             │
//! │                 (protocol library contract)                      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notifications travel from the transport's context through the
//! dispatcher into the queue. Only [`TagClient::drain`] applies them to the
//! registry, on the consumer's own context.

mod connection;
mod conversion;
mod facade;
mod queue;
#[cfg(feature = "real-transport")]
mod real_transport;
mod subscription;
mod transport;
mod write;

pub use connection::{ConnectionManager, ConnectionState, ConnectionStats};
pub use conversion::convert;
pub use facade::{ChannelListener, TagClient, TagUpdateListener};
pub use queue::{ActionQueue, DrainReport, PendingAction, QueueStats};
#[cfg(feature = "real-transport")]
pub use real_transport::RealTransport;
pub use subscription::{DispatchStats, SetupReport, SubscriptionDispatcher};
pub use transport::{
    MonitoredItemHandle, MonitoredItemNotification, NotificationSink, SessionHandle,
    SubscriptionHandle, UaTransport, WriteRequest,
};
pub use write::{WriteCoordinator, WriteStats};
