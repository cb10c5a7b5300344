// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the tag client.
//!
//! # Error Categories
//!
//! ```text
//! ClientError
//! ├── Connection      - Session establishment and liveness
//! ├── UnknownTag      - Name not present in the registry
//! ├── UnknownAddress  - Name has no entry in the address table
//! ├── Conversion      - Raw write value does not parse as the tag type
//! ├── UnsupportedType - Tag type cannot be written
//! ├── WriteRejected   - Server answered a write with a non-Good status
//! └── Protocol        - Malformed or missing responses, timeouts
//! ```
//!
//! Connection failures are self-healing: the [`ConnectionManager`] absorbs
//! them into its reconnect loop. Everything else is returned to the caller
//! and never changes connection state.
//!
//! [`ConnectionManager`]: crate::client::ConnectionManager

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::types::{DataType, StatusCode};

// =============================================================================
// ClientError
// =============================================================================

/// The main error type for tag client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// The tag is not present in the registry.
    #[error("Tag '{name}' not found")]
    UnknownTag {
        /// Display name that was looked up.
        name: String,
    },

    /// The tag has no node address in the address table.
    #[error("No node address configured for tag '{name}'")]
    UnknownAddress {
        /// Display name that was resolved.
        name: String,
    },

    /// A raw value could not be converted to the tag's data type.
    #[error("Cannot convert '{value}' to {target}: {reason}")]
    Conversion {
        /// The offending raw value (trimmed).
        value: String,
        /// The target data type.
        target: DataType,
        /// Parser message.
        reason: String,
    },

    /// The tag's data type cannot be written.
    #[error("Writing values of type {data_type} is not supported")]
    UnsupportedType {
        /// The unsupported data type.
        data_type: DataType,
    },

    /// The server rejected a write.
    #[error("Write to '{node_id}' rejected: {status}")]
    WriteRejected {
        /// Target node address.
        node_id: String,
        /// Status code returned by the server.
        status: StatusCode,
    },

    /// Protocol-level failures.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates an unknown tag error.
    pub fn unknown_tag(name: impl Into<String>) -> Self {
        Self::UnknownTag { name: name.into() }
    }

    /// Creates an unknown address error.
    pub fn unknown_address(name: impl Into<String>) -> Self {
        Self::UnknownAddress { name: name.into() }
    }

    /// Creates a conversion error.
    pub fn conversion(
        value: impl Into<String>,
        target: DataType,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            value: value.into(),
            target,
            reason: reason.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(data_type: DataType) -> Self {
        Self::UnsupportedType { data_type }
    }

    /// Creates a write rejected error.
    pub fn write_rejected(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::WriteRejected {
            node_id: node_id.into(),
            status,
        }
    }

    /// Creates a "no results" protocol error.
    pub fn no_results(operation: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::NoResults {
            operation: operation.into(),
        })
    }

    /// Creates a transport protocol error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Protocol(ProtocolError::Transport {
            message: message.into(),
        })
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if the error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if retrying the operation later may succeed.
    ///
    /// Writes are never retried automatically; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Protocol(e) => e.is_retryable(),
            Self::WriteRejected { status, .. } => status.is_uncertain(),
            Self::UnknownTag { .. }
            | Self::UnknownAddress { .. }
            | Self::Conversion { .. }
            | Self::UnsupportedType { .. } => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Protocol(_) => ErrorSeverity::Error,
            Self::WriteRejected { .. } => ErrorSeverity::Error,
            Self::UnknownTag { .. } | Self::UnknownAddress { .. } => ErrorSeverity::Warning,
            Self::Conversion { .. } | Self::UnsupportedType { .. } => ErrorSeverity::Warning,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::UnknownTag { .. } => "unknown_tag",
            Self::UnknownAddress { .. } => "unknown_address",
            Self::Conversion { .. } => "conversion",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::WriteRejected { .. } => "write_rejected",
            Self::Protocol(_) => "protocol",
        }
    }

    /// Returns the status code carried by this error, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::WriteRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        match self.severity().to_tracing_level() {
            Level::ERROR => tracing::error!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Session establishment and liveness errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No live session.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// Endpoint URL is malformed.
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint {
        /// The endpoint URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint discovery failed for '{endpoint}': {message}")]
    DiscoveryFailed {
        /// The endpoint URL.
        endpoint: String,
        /// Error message.
        message: String,
    },

    /// The server exposes no endpoint matching the security settings.
    #[error("No endpoint on '{endpoint}' matches security '{security}'")]
    NoSuitableEndpoint {
        /// The endpoint URL.
        endpoint: String,
        /// Requested policy/mode pair.
        security: String,
    },

    /// Session creation or activation failed.
    #[error("Failed to open session on '{endpoint}': {message}")]
    SessionFailed {
        /// The endpoint URL.
        endpoint: String,
        /// Error message.
        message: String,
    },

    /// Subscription could not be created on a fresh session.
    #[error("Failed to create subscription: {message}")]
    SubscriptionFailed {
        /// Error message.
        message: String,
    },

    /// Application configuration is invalid.
    #[error("Invalid application configuration: {message}")]
    InvalidConfiguration {
        /// Error message.
        message: String,
    },

    /// The client is shutting down.
    #[error("Client is shutting down")]
    ShuttingDown,
}

impl ConnectionError {
    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a discovery failed error.
    pub fn discovery_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(endpoint: impl Into<String>, security: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            endpoint: endpoint.into(),
            security: security.into(),
        }
    }

    /// Creates a session failed error.
    pub fn session_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a subscription failed error.
    pub fn subscription_failed(message: impl Into<String>) -> Self {
        Self::SubscriptionFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotConnected
            | Self::DiscoveryFailed { .. }
            | Self::NoSuitableEndpoint { .. }
            | Self::SessionFailed { .. }
            | Self::SubscriptionFailed { .. } => true,
            Self::InvalidEndpoint { .. }
            | Self::InvalidConfiguration { .. }
            | Self::ShuttingDown => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::ShuttingDown => ErrorSeverity::Warning,
            Self::InvalidEndpoint { .. } | Self::InvalidConfiguration { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Protocol-level failures reported by the transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The server returned an empty result list.
    #[error("No results returned from {operation}")]
    NoResults {
        /// Operation name.
        operation: String,
    },

    /// The request did not complete in time.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Operation name.
        operation: String,
        /// Timeout that elapsed.
        duration: Duration,
    },

    /// Transport failure without a server status.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with ClientError.
pub type ClientResult<T> = Result<T, ClientError>;

// =============================================================================
// Tests
// =============================================================================
