// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport on top of the `opcua` crate.
//!
//! The `opcua` 0.12 client API is synchronous, so every call that touches
//! the network runs on the blocking pool. Each session gets its own
//! protocol run loop (publish requests, keep-alives), started with
//! [`Session::run_async`] and stopped when the session is closed.
//!
//! Notifications are delivered on the library's thread. The data change
//! callback maps the monitored node back to its display name and hands the
//! latest value to the [`NotificationSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uatag_core::client::{RealTransport, TagClient};
//!
//! let transport = Arc::new(RealTransport::new());
//! let client = TagClient::new(config, catalog, transport);
//! client.start().await?;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::{
    AttributeId, AttributeService, ClientBuilder, DataChangeCallback, ExtensionObject,
    IdentityToken, MonitoredItem, MonitoredItemCreateRequest, MonitoringMode,
    MonitoringParameters, ReadValueId, Session, SessionCommand, SubscriptionService,
    TimestampsToReturn, WriteValue,
};
use opcua::sync::RwLock as OpcUaRwLock;
use opcua::types::{QualifiedName, UAString, Variant};

use crate::client::transport::{
    MonitoredItemHandle, MonitoredItemNotification, NotificationSink, SessionHandle,
    SubscriptionHandle, UaTransport, WriteRequest,
};
use crate::config::{ClientConfig, SecurityMode, SecurityPolicy, SubscriptionSettings};
use crate::error::{ClientError, ClientResult, ConnectionError, ProtocolError};
use crate::types::{DataValue, NodeAddress, NodeIdentifier, StatusCode, Value};

type SharedSession = Arc<OpcUaRwLock<Session>>;
type NodeNames = Arc<RwLock<HashMap<opcua::types::NodeId, String>>>;

// =============================================================================
// Bookkeeping
// =============================================================================

struct SessionEntry {
    session: SharedSession,
    stop: Option<tokio::sync::oneshot::Sender<SessionCommand>>,
    endpoint: String,
}

struct SubscriptionEntry {
    session: SessionHandle,
    server_id: u32,
    names: NodeNames,
    sampling_interval: Duration,
}

// =============================================================================
// RealTransport
// =============================================================================

/// Production transport.
pub struct RealTransport {
    sessions: Mutex<HashMap<u64, SessionEntry>>,
    subscriptions: Mutex<HashMap<u32, SubscriptionEntry>>,
    next_session: AtomicU64,
    next_subscription: AtomicU32,
    next_item: AtomicU32,
}

impl RealTransport {
    /// Creates a transport with no open sessions.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            next_subscription: AtomicU32::new(1),
            next_item: AtomicU32::new(1),
        }
    }

    fn session(&self, handle: SessionHandle) -> ClientResult<SharedSession> {
        self.sessions
            .lock()
            .get(&handle.0)
            .map(|entry| Arc::clone(&entry.session))
            .ok_or_else(ClientError::not_connected)
    }

    fn policy(policy: SecurityPolicy) -> opcua::crypto::SecurityPolicy {
        match policy {
            SecurityPolicy::None => opcua::crypto::SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15 => opcua::crypto::SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256 => opcua::crypto::SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256 => opcua::crypto::SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep => {
                opcua::crypto::SecurityPolicy::Aes128Sha256RsaOaep
            }
            SecurityPolicy::Aes256Sha256RsaPss => opcua::crypto::SecurityPolicy::Aes256Sha256RsaPss,
        }
    }

    fn mode(mode: SecurityMode) -> opcua::types::MessageSecurityMode {
        match mode {
            SecurityMode::None => opcua::types::MessageSecurityMode::None,
            SecurityMode::Sign => opcua::types::MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => opcua::types::MessageSecurityMode::SignAndEncrypt,
        }
    }

    /// The library keeps every certificate store under one PKI root. When
    /// only the individual stores are configured, their common parent is used.
    fn pki_root(config: &ClientConfig) -> Option<PathBuf> {
        let security = &config.security;
        security.pki_dir.clone().or_else(|| {
            security
                .own_store
                .as_ref()
                .and_then(|store| store.parent().map(|p| p.to_path_buf()))
        })
    }

    fn open_session(config: &ClientConfig) -> ClientResult<SharedSession> {
        let mut builder = ClientBuilder::new()
            .application_name(&config.application_name)
            .application_uri(config.application_uri())
            // Reconnects are owned by the connection manager.
            .session_retry_limit(0)
            .session_timeout(config.session_timeout.as_millis() as u32)
            .trust_server_certs(config.security.auto_accept_untrusted)
            .create_sample_keypair(config.security.uses_security());

        if let Some(product_uri) = &config.product_uri {
            builder = builder.product_uri(product_uri);
        }
        if let Some(pki_dir) = Self::pki_root(config) {
            builder = builder.pki_dir(pki_dir);
        }

        let mut client = builder.client().ok_or_else(|| {
            ConnectionError::invalid_configuration("protocol client could not be built")
        })?;

        let endpoints = client
            .get_server_endpoints_from_url(config.endpoint.as_str())
            .map_err(|status| {
                ConnectionError::discovery_failed(&config.endpoint, StatusCode(status.bits()).to_string())
            })?;

        let policy = Self::policy(config.security.policy);
        let mode = Self::mode(config.security.mode);
        let endpoint = endpoints
            .iter()
            .find(|e| e.security_policy_uri.as_ref() == policy.to_uri() && e.security_mode == mode)
            .cloned()
            .ok_or_else(|| {
                ConnectionError::no_suitable_endpoint(
                    &config.endpoint,
                    format!("{}/{}", config.security.policy, config.security.mode),
                )
            })?;

        debug!(
            security_policy = %endpoint.security_policy_uri,
            security_mode = ?endpoint.security_mode,
            "Selected endpoint"
        );

        let session = client
            .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
            .map_err(|status| {
                ConnectionError::session_failed(&config.endpoint, StatusCode(status.bits()).to_string())
            })?;

        Ok(session)
    }

    fn subscription(&self, handle: SubscriptionHandle) -> ClientResult<(SessionHandle, u32, NodeNames, Duration)> {
        self.subscriptions
            .lock()
            .get(&handle.0)
            .map(|s| (s.session, s.server_id, Arc::clone(&s.names), s.sampling_interval))
            .ok_or_else(|| ClientError::transport(format!("unknown subscription {handle}")))
    }

    fn forget_subscriptions_of(&self, session: SessionHandle) {
        self.subscriptions.lock().retain(|_, s| s.session != session);
    }
}

impl Default for RealTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RealTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealTransport")
            .field("sessions", &self.sessions.lock().len())
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish()
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn to_node_id(address: &NodeAddress) -> ClientResult<opcua::types::NodeId> {
    let ns = address.namespace;
    match &address.identifier {
        NodeIdentifier::Numeric(id) => Ok(opcua::types::NodeId::new(ns, *id)),
        NodeIdentifier::String(id) => Ok(opcua::types::NodeId::new(ns, id.clone())),
        NodeIdentifier::Guid(_) | NodeIdentifier::Opaque(_) => {
            opcua::types::NodeId::from_str(&format!("ns={};{}", ns, address.identifier))
                .map_err(|_| ClientError::transport(format!("unsupported node id {address}")))
        }
    }
}

fn to_timestamp(t: &opcua::types::DateTime) -> chrono::DateTime<chrono::Utc> {
    t.as_chrono()
}

fn from_variant(variant: &Variant) -> Value {
    match variant {
        Variant::Empty => Value::Null,
        Variant::Boolean(v) => Value::Boolean(*v),
        Variant::SByte(v) => Value::SByte(*v),
        Variant::Byte(v) => Value::Byte(*v),
        Variant::Int16(v) => Value::Int16(*v),
        Variant::UInt16(v) => Value::UInt16(*v),
        Variant::Int32(v) => Value::Int32(*v),
        Variant::UInt32(v) => Value::UInt32(*v),
        Variant::Int64(v) => Value::Int64(*v),
        Variant::UInt64(v) => Value::UInt64(*v),
        Variant::Float(v) => Value::Float(*v),
        Variant::Double(v) => Value::Double(*v),
        Variant::String(v) => Value::String(v.as_ref().to_string()),
        Variant::DateTime(v) => Value::DateTime(v.as_chrono()),
        Variant::Guid(v) => Value::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        Variant::ByteString(v) => Value::ByteString(v.value.clone().unwrap_or_default()),
        other => Value::String(format!("{other:?}")),
    }
}

fn to_variant(value: &Value) -> Variant {
    match value {
        Value::Null => Variant::Empty,
        Value::Boolean(v) => Variant::Boolean(*v),
        Value::SByte(v) => Variant::SByte(*v),
        Value::Byte(v) => Variant::Byte(*v),
        Value::Int16(v) => Variant::Int16(*v),
        Value::UInt16(v) => Variant::UInt16(*v),
        Value::Int32(v) => Variant::Int32(*v),
        Value::UInt32(v) => Variant::UInt32(*v),
        Value::Int64(v) => Variant::Int64(*v),
        Value::UInt64(v) => Variant::UInt64(*v),
        Value::Float(v) => Variant::Float(*v),
        Value::Double(v) => Variant::Double(*v),
        Value::String(v) => Variant::String(UAString::from(v.as_str())),
        Value::DateTime(v) => Variant::DateTime(Box::new(opcua::types::DateTime::from(*v))),
        Value::Guid(v) => Variant::Guid(Box::new(opcua::types::Guid::from(*v))),
        Value::ByteString(v) => Variant::ByteString(opcua::types::ByteString::from(v.as_slice())),
    }
}

fn from_data_value(dv: &opcua::types::DataValue) -> DataValue {
    DataValue {
        value: dv.value.as_ref().map(from_variant).unwrap_or_default(),
        source_timestamp: dv.source_timestamp.as_ref().map(to_timestamp),
        status: dv
            .status
            .map(|s| StatusCode(s.bits()))
            .unwrap_or(StatusCode::GOOD),
    }
}

/// Values of `window` that arrived after `last`, oldest first.
///
/// The library keeps a sliding window of recent values per monitored item;
/// everything up to and including the last forwarded value was delivered by
/// an earlier callback.
fn unseen_tail<'a, T: PartialEq>(window: &'a [T], last: Option<&T>) -> &'a [T] {
    match last.and_then(|last| window.iter().rposition(|v| v == last)) {
        Some(index) => &window[index + 1..],
        None => window,
    }
}

async fn blocking<T, F>(operation: &'static str, f: F) -> ClientResult<T>
where
    F: FnOnce() -> ClientResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClientError::transport(format!("{operation} task failed: {e}")))?
}

// =============================================================================
// UaTransport
// =============================================================================

#[async_trait]
impl UaTransport for RealTransport {
    async fn connect(&self, config: &ClientConfig) -> ClientResult<SessionHandle> {
        info!(endpoint = %config.endpoint, "Connecting to OPC UA server");

        let owned = config.clone();
        let session = blocking("connect", move || Self::open_session(&owned)).await?;
        let stop = Session::run_async(Arc::clone(&session));

        let handle = SessionHandle(self.next_session.fetch_add(1, Ordering::SeqCst));
        self.sessions.lock().insert(
            handle.0,
            SessionEntry {
                session,
                stop: Some(stop),
                endpoint: config.endpoint.clone(),
            },
        );

        info!(endpoint = %config.endpoint, %handle, "Session activated");
        Ok(handle)
    }

    fn is_session_connected(&self, session: SessionHandle) -> bool {
        match self.sessions.lock().get(&session.0) {
            Some(entry) => entry.session.read().is_connected(),
            None => false,
        }
    }

    async fn create_subscription(
        &self,
        session: SessionHandle,
        settings: &SubscriptionSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> ClientResult<SubscriptionHandle> {
        let shared = self.session(session)?;
        let names: NodeNames = Arc::new(RwLock::new(HashMap::new()));

        let callback_names = Arc::clone(&names);
        let forwarded: Mutex<HashMap<opcua::types::NodeId, opcua::types::DataValue>> =
            Mutex::new(HashMap::new());
        let callback = DataChangeCallback::new(move |items: Vec<&MonitoredItem>| {
            for item in items {
                let node_id = &item.item_to_monitor().node_id;
                let Some(display_name) = callback_names.read().get(node_id).cloned() else {
                    trace!(%node_id, "Notification for unregistered node");
                    continue;
                };

                let window: Vec<opcua::types::DataValue> = item.values().iter().cloned().collect();
                let values: Vec<DataValue> = {
                    let mut forwarded = forwarded.lock();
                    let fresh = unseen_tail(&window, forwarded.get(node_id));
                    if let Some(newest) = fresh.last() {
                        forwarded.insert(node_id.clone(), newest.clone());
                    }
                    fresh.iter().map(from_data_value).collect()
                };
                if values.is_empty() {
                    continue;
                }

                sink.on_notification(MonitoredItemNotification {
                    display_name,
                    values,
                });
            }
        });

        let publishing_interval = settings.publishing_interval.as_millis() as f64;
        let lifetime_count = settings.lifetime_count;
        let keepalive_count = settings.keepalive_count;
        let max_notifications = settings.max_notifications_per_publish;
        let priority = settings.priority;

        let server_id = blocking("create_subscription", move || {
            shared
                .read()
                .create_subscription(
                    publishing_interval,
                    lifetime_count,
                    keepalive_count,
                    max_notifications,
                    priority,
                    true,
                    callback,
                )
                .map_err(|status| {
                    ClientError::from(ConnectionError::subscription_failed(
                        StatusCode(status.bits()).to_string(),
                    ))
                })
        })
        .await?;

        let handle = SubscriptionHandle(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.subscriptions.lock().insert(
            handle.0,
            SubscriptionEntry {
                session,
                server_id,
                names,
                sampling_interval: settings.sampling_interval,
            },
        );

        debug!(%handle, server_id, "Subscription created on server");
        Ok(handle)
    }

    async fn create_monitored_item(
        &self,
        subscription: SubscriptionHandle,
        address: &NodeAddress,
        display_name: &str,
        sampling_interval: Duration,
    ) -> ClientResult<MonitoredItemHandle> {
        let (session, server_id, names, default_sampling) = self.subscription(subscription)?;
        let shared = self.session(session)?;
        let node_id = to_node_id(address)?;

        let sampling = if sampling_interval.is_zero() {
            default_sampling
        } else {
            sampling_interval
        };

        // Registered before creation so the first notification finds its name.
        names.write().insert(node_id.clone(), display_name.to_string());

        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId {
                node_id: node_id.clone(),
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            },
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: 0,
                sampling_interval: sampling.as_millis() as f64,
                filter: ExtensionObject::null(),
                queue_size: 10,
                discard_oldest: true,
            },
        };

        let results = blocking("create_monitored_item", move || {
            shared
                .read()
                .create_monitored_items(server_id, TimestampsToReturn::Both, &[request])
                .map_err(|status| ClientError::transport(StatusCode(status.bits()).to_string()))
        })
        .await;

        let created = match results {
            Ok(results) => match results.first() {
                Some(r) if r.status_code.is_good() => Ok(r.monitored_item_id),
                Some(r) => Err(ClientError::transport(format!(
                    "monitored item refused: {}",
                    StatusCode(r.status_code.bits())
                ))),
                None => Err(ClientError::no_results("create_monitored_item")),
            },
            Err(e) => Err(e),
        };

        match created {
            Ok(server_item_id) => {
                trace!(tag = %display_name, node_id = %address, server_item_id, "Monitored item created on server");
                Ok(MonitoredItemHandle(self.next_item.fetch_add(1, Ordering::SeqCst)))
            }
            Err(e) => {
                names.write().remove(&node_id);
                Err(e)
            }
        }
    }

    async fn write(&self, session: SessionHandle, request: WriteRequest) -> ClientResult<Vec<StatusCode>> {
        let shared = self.session(session)?;
        let node_id = to_node_id(&request.address)?;

        // Bare value: servers such as CODESYS refuse Value writes that carry
        // source or server timestamps. The request header is stamped by the
        // library.
        let write_value = WriteValue {
            node_id,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            value: opcua::types::DataValue::value_only(to_variant(&request.value)),
        };

        trace!(node_id = %request.address, timeout_ms = request.timeout.as_millis() as u64, "Writing node value");

        let call = blocking("write", move || {
            shared
                .read()
                .write(&[write_value])
                .map_err(|status| ClientError::transport(format!("write service failed: {}", StatusCode(status.bits()))))
        });
        let results = tokio::time::timeout(request.timeout, call)
            .await
            .map_err(|_| ProtocolError::timeout("write", request.timeout))??;

        Ok(results.iter().map(|s| StatusCode(s.bits())).collect())
    }

    async fn delete_subscription(
        &self,
        session: SessionHandle,
        subscription: SubscriptionHandle,
    ) -> ClientResult<()> {
        let Some(entry) = self.subscriptions.lock().remove(&subscription.0) else {
            return Ok(());
        };
        let shared = self.session(session)?;
        let server_id = entry.server_id;

        blocking("delete_subscription", move || {
            shared
                .read()
                .delete_subscription(server_id)
                .map(|_| ())
                .map_err(|status| ClientError::transport(StatusCode(status.bits()).to_string()))
        })
        .await
    }

    async fn close(&self, session: SessionHandle) -> ClientResult<()> {
        let Some(mut entry) = self.sessions.lock().remove(&session.0) else {
            return Ok(());
        };
        self.forget_subscriptions_of(session);

        if let Some(stop) = entry.stop.take() {
            if stop.send(SessionCommand::Stop).is_err() {
                debug!(%session, "Session run loop already stopped");
            }
        }

        let endpoint = entry.endpoint;
        let shared = entry.session;
        blocking("close", move || {
            shared.read().disconnect();
            Ok(())
        })
        .await?;

        info!(%endpoint, %session, "Session closed");
        Ok(())
    }

    fn name(&self) -> &str {
        "opcua"
    }
}

impl Drop for RealTransport {
    fn drop(&mut self) {
        let sessions = std::mem::take(&mut *self.sessions.lock());
        for (id, mut entry) in sessions {
            if let Some(stop) = entry.stop.take() {
                let _ = stop.send(SessionCommand::Stop);
            }
            warn!(session = id, "Session still open when transport was dropped");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
