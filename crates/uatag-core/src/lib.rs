// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Resilient tag-oriented OPC UA client.
//!
//! Maps human-readable tag names onto OPC UA nodes, keeps a cache of their
//! latest values through a subscription, reconnects on its own and performs
//! validated, type-checked writes.
//!
//! # Features
//!
//! - Tag registry with insertion-ordered, unique display names
//! - Subscription with one monitored item per addressable tag
//! - Thread-safe hand-off of notifications to a single consumer context
//! - Reconnect state machine with fixed, linear or exponential backoff
//! - Validated writes with status-code reporting
//!
//! # Error Handling
//!
//! ```text
//! ClientError
//! ├── Connection       - Not connected, endpoint, session, subscription
//! ├── UnknownTag       - Name not in the registry
//! ├── UnknownAddress   - Tag has no node address
//! ├── Conversion       - Value text does not parse as the tag type
//! ├── UnsupportedType  - Tag type is not writable
//! ├── WriteRejected    - Server returned a non-Good status
//! └── Protocol         - No results, timeouts, transport failures
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uatag_core::{ClientConfig, DataType, NodeAddress, TagCatalog, TagClient};
//!
//! let config = ClientConfig::builder()
//!     .endpoint("opc.tcp://192.168.1.2:4840")
//!     .no_security()
//!     .build()?;
//!
//! let catalog = TagCatalog::new()
//!     .tag("Auto_Mode", DataType::Boolean, "ns=4;s=PLC_PRG.Auto_Mode".parse()?);
//!
//! let client = TagClient::new(config, catalog, transport);
//! client.start().await?;
//! client.drain();
//! client.write("Auto_Mode", "true").await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod types;

pub use catalog::{CatalogEntry, TagCatalog};
pub use client::{
    ActionQueue, ConnectionManager, ConnectionState, DrainReport, PendingAction,
    SubscriptionDispatcher, TagClient, TagUpdateListener, UaTransport, WriteCoordinator,
};
pub use config::{
    ClientConfig, ClientConfigBuilder, MonitoredNode, ReconnectPolicy, RetryStrategy,
    SecurityConfig, SecurityMode, SecurityPolicy, SubscriptionSettings, UnseenTagPolicy,
};
pub use error::{ClientError, ClientResult, ConnectionError, ErrorSeverity, ProtocolError};
pub use registry::TagRegistry;
pub use resolver::AddressResolver;
pub use types::{DataType, DataValue, NodeAddress, NodeIdentifier, StatusCode, Tag, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
