// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.
//!
//! [`ClientConfig`] carries everything the core needs from the embedding
//! process: the server endpoint, application identity, security settings
//! (passed through to the protocol library), subscription parameters, the
//! write timeout and the reconnect policy.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use uatag_core::config::{ClientConfig, RetryStrategy};
//!
//! let config = ClientConfig::builder()
//!     .endpoint("opc.tcp://192.168.1.2:4840")
//!     .application_name("UnityOPCClient")
//!     .reconnect_interval(Duration::from_secs(5))
//!     .reconnect_strategy(RetryStrategy::Fixed)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.application_uri(), format!("urn:{}:UnityOPCClient", uatag_core::config::hostname()));
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientResult, ConnectionError};
use crate::types::NodeAddress;

/// URL scheme accepted for server endpoints.
pub const ENDPOINT_SCHEME: &str = "opc.tcp://";

/// Shortest pause the supervisor ever takes between two rounds.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// Security
// =============================================================================

/// Security policy for the secure channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityPolicy {
    /// No security.
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    #[default]
    Basic256Sha256,
    /// Aes128_Sha256_RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256_Sha256_RsaPss.
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128_Sha256_RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256_Sha256_RsaPss",
        };
        f.write_str(name)
    }
}

/// Message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityMode {
    /// No signing or encryption.
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    #[default]
    SignAndEncrypt,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Sign => write!(f, "Sign"),
            Self::SignAndEncrypt => write!(f, "SignAndEncrypt"),
        }
    }
}

/// Security settings, passed through to the protocol library untouched.
///
/// The store paths are opaque to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Security policy.
    #[serde(default)]
    pub policy: SecurityPolicy,

    /// Message security mode.
    #[serde(default)]
    pub mode: SecurityMode,

    /// Accept server certificates that are not yet trusted.
    #[serde(default = "default_true")]
    pub auto_accept_untrusted: bool,

    /// PKI root directory used by the protocol library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pki_dir: Option<PathBuf>,

    /// Application instance certificate store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_store: Option<PathBuf>,

    /// Trusted issuer certificate store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_issuer_store: Option<PathBuf>,

    /// Trusted peer certificate store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_peer_store: Option<PathBuf>,

    /// Rejected certificate store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_store: Option<PathBuf>,
}

impl SecurityConfig {
    /// Returns `true` if the channel is signed or encrypted.
    #[inline]
    pub fn uses_security(&self) -> bool {
        self.mode != SecurityMode::None
    }

    /// Returns a configuration without any security.
    pub fn insecure() -> Self {
        Self {
            policy: SecurityPolicy::None,
            mode: SecurityMode::None,
            ..Self::default()
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            policy: SecurityPolicy::default(),
            mode: SecurityMode::default(),
            auto_accept_untrusted: true,
            pki_dir: None,
            own_store: None,
            trusted_issuer_store: None,
            trusted_peer_store: None,
            rejected_store: None,
        }
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// A node subscribed in addition to the tag catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredNode {
    /// Display name used for notifications of this node.
    pub display_name: String,
    /// Node address.
    pub address: NodeAddress,
}

impl MonitoredNode {
    /// Creates a monitored node.
    pub fn new(display_name: impl Into<String>, address: NodeAddress) -> Self {
        Self {
            display_name: display_name.into(),
            address,
        }
    }

    /// The server clock (`Server_ServerStatus_CurrentTime`).
    pub fn current_time() -> Self {
        Self::new("CurrentTime", NodeAddress::numeric(0, 2258))
    }
}

/// Subscription parameters shared by every monitored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Publishing interval.
    #[serde(default = "default_subscription_interval", with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Sampling interval for each monitored item.
    #[serde(default = "default_subscription_interval", with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Lifetime count (publishing intervals before the subscription expires).
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Max keep-alive count.
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,

    /// Maximum notifications per publish (0 = unlimited).
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Priority.
    #[serde(default)]
    pub priority: u8,

    /// Nodes monitored on top of the tag catalog.
    #[serde(default)]
    pub monitored_nodes: Vec<MonitoredNode>,
}

fn default_subscription_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_keepalive_count() -> u32 {
    10
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: default_subscription_interval(),
            sampling_interval: default_subscription_interval(),
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
            monitored_nodes: Vec::new(),
        }
    }
}

// =============================================================================
// ReconnectPolicy
// =============================================================================

/// How the delay between reconnect attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Same delay every time.
    #[default]
    Fixed,
    /// `interval * failures`.
    Linear,
    /// `interval * multiplier^(failures - 1)`.
    Exponential,
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Linear => write!(f, "linear"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

/// Reconnect supervisor policy.
///
/// The default polls every 5 seconds forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Base delay between supervisor ticks.
    #[serde(default = "default_reconnect_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Delay growth after consecutive failures.
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Multiplier for the exponential strategy.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for backoff delays.
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,

    /// Maximum consecutive failed connection attempts, the first one
    /// included. `None` retries forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

fn default_reconnect_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_interval() -> Duration {
    Duration::from_secs(60)
}

impl ReconnectPolicy {
    /// Fixed-interval policy without an attempt limit.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Sets the maximum number of consecutive failed attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Returns the delay before the next attempt after `failures`
    /// consecutive failed attempts. Zero failures means the connection is
    /// healthy and the supervisor only polls liveness. Never shorter than
    /// [`MIN_RECONNECT_DELAY`].
    pub fn delay_for(&self, failures: u32) -> Duration {
        let delay = if failures == 0 {
            self.interval
        } else {
            let base = self.interval.as_millis() as f64;
            let millis = match self.strategy {
                RetryStrategy::Fixed => return self.interval.max(MIN_RECONNECT_DELAY),
                RetryStrategy::Linear => base * failures as f64,
                RetryStrategy::Exponential => {
                    base * self.multiplier.powi(failures.saturating_sub(1).min(32) as i32)
                }
            };
            Duration::from_millis(millis.min(self.max_interval.as_millis() as f64) as u64)
        };

        delay.max(MIN_RECONNECT_DELAY)
    }

    /// Returns `true` once `failures` reaches the attempt limit.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: default_reconnect_interval(),
            strategy: RetryStrategy::Fixed,
            multiplier: default_multiplier(),
            max_interval: default_max_interval(),
            max_attempts: None,
        }
    }
}

// =============================================================================
// UnseenTagPolicy
// =============================================================================

/// What to do with notifications for names absent from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnseenTagPolicy {
    /// Register the tag on first notification.
    #[default]
    Accept,
    /// Refuse the update; the drain reports it as failed.
    Reject,
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Configuration of the tag client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Application name.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI; derived from the host name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_uri: Option<String>,

    /// Product URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_uri: Option<String>,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Transport operation timeout.
    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Security settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Subscription settings.
    #[serde(default)]
    pub subscription: SubscriptionSettings,

    /// Timeout hint and deadline for a single write.
    #[serde(default = "default_write_timeout", with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Reconnect policy.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Handling of notifications for names absent from the catalog.
    #[serde(default)]
    pub unseen_tags: UnseenTagPolicy,
}

fn default_endpoint() -> String {
    "opc.tcp://192.168.1.2:4840".to_string()
}

fn default_application_name() -> String {
    "UnityOPCClient".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_millis(60_000)
}

fn default_operation_timeout() -> Duration {
    Duration::from_millis(15_000)
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

/// Returns the host name used in the default application URI.
pub fn hostname() -> String {
    ["HOSTNAME", "HOST", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Creates a configuration with default settings for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Returns the effective application URI.
    pub fn application_uri(&self) -> String {
        self.application_uri
            .clone()
            .unwrap_or_else(|| format!("urn:{}:{}", hostname(), self.application_name))
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ClientResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ConnectionError::invalid_endpoint(&self.endpoint, "endpoint is empty").into());
        }

        let host = self.endpoint.strip_prefix(ENDPOINT_SCHEME).ok_or_else(|| {
            ConnectionError::invalid_endpoint(
                &self.endpoint,
                format!("endpoint must start with {}", ENDPOINT_SCHEME),
            )
        })?;
        if host.is_empty() || host.starts_with('/') {
            return Err(ConnectionError::invalid_endpoint(&self.endpoint, "missing host").into());
        }

        if self.application_name.trim().is_empty() {
            return Err(ConnectionError::invalid_configuration("application name is empty").into());
        }

        if self.security.uses_security() != (self.security.policy != SecurityPolicy::None) {
            return Err(ConnectionError::invalid_configuration(format!(
                "security mode {} does not match policy {}",
                self.security.mode, self.security.policy
            ))
            .into());
        }

        let intervals = [
            ("session_timeout", self.session_timeout),
            ("operation_timeout", self.operation_timeout),
            ("write_timeout", self.write_timeout),
            ("subscription.publishing_interval", self.subscription.publishing_interval),
            ("subscription.sampling_interval", self.subscription.sampling_interval),
            ("reconnect.interval", self.reconnect.interval),
        ];
        for (field, value) in intervals {
            if value.is_zero() {
                return Err(ConnectionError::invalid_configuration(format!(
                    "{} must be greater than 0",
                    field
                ))
                .into());
            }
        }

        if self.reconnect.max_interval < self.reconnect.interval {
            return Err(ConnectionError::invalid_configuration(
                "reconnect.max_interval must not be below reconnect.interval",
            )
            .into());
        }

        if self.reconnect.multiplier.is_nan() || self.reconnect.multiplier < 1.0 {
            return Err(ConnectionError::invalid_configuration(
                "reconnect.multiplier must be at least 1.0",
            )
            .into());
        }

        if self.reconnect.max_attempts == Some(0) {
            return Err(ConnectionError::invalid_configuration(
                "reconnect.max_attempts must be greater than 0",
            )
            .into());
        }

        if let Some(node) = self
            .subscription
            .monitored_nodes
            .iter()
            .find(|node| node.display_name.trim().is_empty())
        {
            return Err(ConnectionError::invalid_configuration(format!(
                "monitored node {} has an empty display name",
                node.address
            ))
            .into());
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            application_name: default_application_name(),
            application_uri: None,
            product_uri: None,
            session_timeout: default_session_timeout(),
            operation_timeout: default_operation_timeout(),
            security: SecurityConfig::default(),
            subscription: SubscriptionSettings::default(),
            write_timeout: default_write_timeout(),
            reconnect: ReconnectPolicy::default(),
            unseen_tags: UnseenTagPolicy::default(),
        }
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = Some(uri.into());
        self
    }

    /// Sets the product URI.
    pub fn product_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.product_uri = Some(uri.into());
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets the operation timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Sets the security settings.
    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// Disables security.
    pub fn no_security(self) -> Self {
        self.security(SecurityConfig::insecure())
    }

    /// Sets the subscription settings.
    pub fn subscription(mut self, settings: SubscriptionSettings) -> Self {
        self.config.subscription = settings;
        self
    }

    /// Adds a node monitored on top of the catalog.
    pub fn monitor(mut self, node: MonitoredNode) -> Self {
        self.config.subscription.monitored_nodes.push(node);
        self
    }

    /// Sets the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Sets the whole reconnect policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Sets the reconnect interval.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect.interval = interval;
        self
    }

    /// Sets the reconnect strategy.
    pub fn reconnect_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.config.reconnect.strategy = strategy;
        self
    }

    /// Sets the maximum number of consecutive failed connection attempts.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect.max_attempts = Some(attempts);
        self
    }

    /// Sets the unseen tag policy.
    pub fn unseen_tags(mut self, policy: UnseenTagPolicy) -> Self {
        self.config.unseen_tags = policy;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ClientResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Tests
// =============================================================================
