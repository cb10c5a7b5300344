// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Shutdown Integration Tests
//!
//! Client teardown and the host runtime lifecycle.

use std::sync::Arc;
use std::time::Duration;

use uatag_bin::{RuntimeBuilder, ShutdownCoordinator, TagAssignment};
use uatag_config::{load_config_str, ConfigFormat};
use uatag_core::{ClientError, ConnectionError, ConnectionState, UaTransport, Value};

use uatag_tests::prelude::*;

// =============================================================================
// Client shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_without_connection_is_idempotent() {
    let harness = ClientHarness::new();

    harness.shutdown().await;
    harness.shutdown().await;

    assert_eq!(harness.client.state(), ConnectionState::Disconnected);
    assert!(harness.transport.closed_sessions().is_empty());
    assert!(harness.transport.deleted_subscriptions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_subscription_and_session() {
    let harness = ClientHarness::connected().await;
    let subscription = harness
        .client
        .connection()
        .subscription()
        .expect("subscription active");
    let session = harness.client.connection().session().expect("session live");

    harness.shutdown().await;

    assert_eq!(harness.client.state(), ConnectionState::Disconnected);
    assert_eq!(harness.transport.deleted_subscriptions(), vec![subscription]);
    assert_eq!(harness.transport.closed_sessions(), vec![session]);
    assert_eq!(harness.transport.live_session_count(), 0);
    assert!(!harness.client.connection().supervisor_running());

    // A second call has nothing left to release.
    harness.shutdown().await;
    assert_eq!(harness.transport.closed_sessions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_reconnecting() {
    let harness = ClientHarness::new();
    harness.transport.fail_all_connects(true);
    let _ = harness.client.start().await;
    assert_eq!(harness.client.state(), ConnectionState::Reconnecting);

    harness.shutdown().await;
    let attempts = harness.transport.connect_count();
    tokio::time::sleep(ConfigFixtures::RECONNECT_INTERVAL * 10).await;

    assert_eq!(harness.transport.connect_count(), attempts);
    assert_eq!(harness.client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_refuses_new_connections() {
    let harness = ClientHarness::new();
    harness.shutdown().await;

    let result = harness.client.start().await;
    assert!(matches!(
        result,
        Err(ClientError::Connection(ConnectionError::ShuttingDown))
    ));
    assert_eq!(harness.transport.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_then_write_is_not_connected() {
    let harness = ClientHarness::connected().await;
    harness.shutdown().await;

    let err = harness.client.write("Auto_Mode", "true").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Connection(ConnectionError::NotConnected)
    ));
    assert!(harness.transport.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_keeps_queued_updates_for_final_drain() {
    let harness = ClientHarness::connected().await;
    harness.notify("Box_Count", Value::Int32(42));

    harness.shutdown().await;

    assert_eq!(harness.drain().applied, 1);
    assert_eq!(harness.value("Box_Count").as_deref(), Some("42"));
}

// =============================================================================
// Coordinator
// =============================================================================

#[tokio::test]
async fn test_coordinator_signal_after_initiation_resolves() {
    let coordinator = ShutdownCoordinator::new();
    coordinator.initiate_shutdown();

    // Subscribed late, still observes the flag.
    let mut signal = coordinator.shutdown_signal();
    tokio::time::timeout(Duration::from_secs(1), signal.wait())
        .await
        .expect("signal resolves");
    assert!(coordinator.is_shutdown_initiated());
}

// =============================================================================
// Host runtime
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_runtime_drains_writes_and_shuts_down() {
    init_test_logging();
    let config = load_config_str(ConfigFixtures::yaml(), ConfigFormat::Yaml).expect("fixture parses");
    let transport = MockTransport::shared();
    let dyn_transport: Arc<dyn UaTransport> = transport.clone();
    let coordinator = ShutdownCoordinator::new();

    let assignment: TagAssignment = "Auto_Mode=true".parse().expect("valid assignment");
    let runtime = RuntimeBuilder::new()
        .config(config)
        .transport(dyn_transport)
        .cycle(Duration::from_millis(10))
        .writes(vec![assignment])
        .shutdown(coordinator.clone())
        .build()
        .expect("runtime builds");
    let handle = tokio::spawn(runtime.run());

    while transport.subscription_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(transport.monitored_names(), vec!["System_State", "X_postion", "Auto_Mode"]);

    transport.notify("X_postion", Value::Double(3.5));
    transport.notify("System_State", Value::String("Running".into()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    coordinator.initiate_shutdown();
    let summary = handle
        .await
        .expect("runtime task")
        .expect("runtime succeeds");

    assert!(summary.cycles > 0);
    assert_eq!(summary.applied, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.writes_succeeded, 1);
    assert_eq!(summary.writes_failed, 0);

    let writes = transport.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].value, Value::Boolean(true));
    assert_eq!(transport.closed_sessions().len(), 1);
    assert_eq!(transport.deleted_subscriptions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_counts_rejected_writes() {
    init_test_logging();
    let config = load_config_str(ConfigFixtures::yaml(), ConfigFormat::Yaml).expect("fixture parses");
    let transport = MockTransport::shared();
    transport.script_write(WriteOutcome::Status(uatag_core::StatusCode::BAD_NOT_WRITABLE));
    let dyn_transport: Arc<dyn UaTransport> = transport.clone();
    let coordinator = ShutdownCoordinator::new();

    let runtime = RuntimeBuilder::new()
        .config(config)
        .transport(dyn_transport)
        .cycle(Duration::from_millis(10))
        .writes(vec![
            "X_postion=12.5".parse().expect("valid"),
            "Auto_Mode=maybe".parse().expect("valid"),
        ])
        .shutdown(coordinator.clone())
        .build()
        .expect("runtime builds");
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    coordinator.initiate_shutdown();
    let summary = handle.await.expect("runtime task").expect("runtime succeeds");

    assert_eq!(summary.writes_succeeded, 0);
    assert_eq!(summary.writes_failed, 2);
    // The conversion failure never reached the server.
    assert_eq!(transport.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_fails_fast_on_invalid_client_config() {
    init_test_logging();
    let mut config = load_config_str(ConfigFixtures::yaml(), ConfigFormat::Yaml).expect("fixture parses");
    config.client.reconnect.interval = Duration::ZERO;
    let transport = MockTransport::shared();
    let dyn_transport: Arc<dyn UaTransport> = transport.clone();

    let runtime = RuntimeBuilder::new()
        .config(config)
        .transport(dyn_transport)
        .build()
        .expect("runtime builds");
    let result = tokio::time::timeout(Duration::from_secs(5), runtime.run())
        .await
        .expect("runtime returns without a shutdown signal");

    assert!(matches!(
        result,
        Err(uatag_bin::BinError::Client(ClientError::Connection(
            ConnectionError::InvalidConfiguration { .. }
        )))
    ));
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_survives_unreachable_server() {
    init_test_logging();
    let config = load_config_str(ConfigFixtures::yaml(), ConfigFormat::Yaml).expect("fixture parses");
    let transport = MockTransport::shared();
    transport.fail_all_connects(true);
    let dyn_transport: Arc<dyn UaTransport> = transport.clone();
    let coordinator = ShutdownCoordinator::new();

    let runtime = RuntimeBuilder::new()
        .config(config)
        .transport(dyn_transport)
        .writes(vec!["Auto_Mode=true".parse().expect("valid")])
        .shutdown(coordinator.clone())
        .build()
        .expect("runtime builds");
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(Duration::from_secs(5)).await;
    coordinator.initiate_shutdown();
    let summary = handle.await.expect("runtime task").expect("runtime succeeds");

    assert!(transport.connect_count() > 1);
    assert_eq!(summary.writes_succeeded + summary.writes_failed, 0);
    assert!(transport.writes().is_empty());
}
