// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Write Integration Tests
//!
//! - validation order: connection, tag, address, conversion
//! - server outcomes: Good, non-Good, empty results, timeout
//! - the cache only changes through notifications

use std::time::Duration;

use uatag_core::{
    ClientError, ConnectionError, ConnectionState, DataType, ProtocolError, StatusCode, Value,
};

use uatag_tests::prelude::*;

// =============================================================================
// Round trip
// =============================================================================

#[tokio::test]
async fn test_write_then_notification_round_trip() {
    let mut harness = ClientHarness::connected().await;

    let status = harness.client.write("X_postion", "12.5").await.unwrap();
    assert_eq!(status, StatusCode::GOOD);

    // Nothing cached until the server echoes the value.
    let tag = harness.client.tag("X_postion").unwrap();
    assert_eq!(tag.value, "");
    assert!(!tag.has_value());
    assert_eq!(harness.drain().total(), 0);
    assert!(harness.take_updates().is_empty());

    let writes = harness.transport.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].address, plc_address("PLC_PRG.Position_to_set_in_Manuel.X"));
    assert_eq!(writes[0].value, Value::Double(12.5));
    assert_eq!(writes[0].timeout, Duration::from_secs(2));

    harness.notify("X_postion", Value::Double(12.5));
    harness.drain();

    let tag = harness.client.tag("X_postion").unwrap();
    assert_eq!(tag.value, "12.5");
    assert_eq!(tag.data_type, DataType::Double);
    assert_eq!(harness.client.write_stats().succeeded(), 1);
}

#[tokio::test]
async fn test_write_converts_with_declared_type() {
    let harness = ClientHarness::connected().await;

    harness.client.write("Auto_Mode", " TRUE ").await.unwrap();
    harness.client.write("Box_Count", "42").await.unwrap();
    harness.client.write("Speed_Override", "-5").await.unwrap();
    harness.client.write("Gripper_Force", "0.75").await.unwrap();
    harness.client.write("System_State", "Idle").await.unwrap();

    let values: Vec<Value> = harness.transport.writes().into_iter().map(|w| w.value).collect();
    assert_eq!(
        values,
        vec![
            Value::Boolean(true),
            Value::Int32(42),
            Value::Int16(-5),
            Value::Float(0.75),
            Value::String("Idle".into()),
        ]
    );
}

// =============================================================================
// Local validation
// =============================================================================

#[tokio::test]
async fn test_write_requires_connection() {
    let harness = ClientHarness::new();

    let err = harness.client.write("Auto_Mode", "true").await.unwrap_err();
    assert!(matches!(err, ClientError::Connection(ConnectionError::NotConnected)));
    assert!(harness.transport.writes().is_empty());
    assert_eq!(harness.client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_write_unknown_tag() {
    let harness = ClientHarness::connected().await;

    let err = harness.client.write("Conveyor_Speed", "1").await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownTag { ref name } if name == "Conveyor_Speed"));
    assert!(harness.transport.writes().is_empty());
}

#[tokio::test]
async fn test_write_unknown_address() {
    let harness = ClientHarness::connected().await;

    let err = harness.client.write("Sen5_", "true").await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownAddress { ref name } if name == "Sen5_"));
    assert!(harness.transport.writes().is_empty());
}

#[tokio::test]
async fn test_write_conversion_failure_leaves_state_alone() {
    let harness = ClientHarness::connected().await;

    let err = harness.client.write("Box_Count", "many").await.unwrap_err();
    assert!(matches!(err, ClientError::Conversion { .. }));

    let err = harness.client.write("Last_Cycle", "2025-01-01T00:00:00Z").await.unwrap_err();
    assert!(matches!(err, ClientError::UnsupportedType { data_type: DataType::DateTime }));

    assert!(harness.transport.writes().is_empty());
    assert_eq!(harness.client.state(), ConnectionState::Connected);
    assert_eq!(harness.client.write_stats().failed(), 2);
}

// =============================================================================
// Server outcomes
// =============================================================================

#[tokio::test]
async fn test_write_rejected_carries_status() {
    let mut harness = ClientHarness::connected().await;
    harness.notify("Auto_Mode", Value::Boolean(false));
    harness.drain();
    harness.take_updates();

    harness
        .transport
        .script_write(WriteOutcome::Status(StatusCode::BAD_NOT_WRITABLE));
    let err = harness.client.write("Auto_Mode", "true").await.unwrap_err();

    assert!(matches!(err, ClientError::WriteRejected { .. }));
    assert_eq!(err.status_code(), Some(StatusCode::BAD_NOT_WRITABLE));
    assert_eq!(harness.value("Auto_Mode").as_deref(), Some("false"));
    assert!(harness.take_updates().is_empty());
    assert_eq!(harness.client.state(), ConnectionState::Connected);
    assert_eq!(harness.client.write_stats().rejected(), 1);
}

#[tokio::test]
async fn test_write_uncertain_status_is_rejected() {
    let harness = ClientHarness::connected().await;
    harness
        .transport
        .script_write(WriteOutcome::Status(StatusCode::UNCERTAIN));

    let err = harness.client.write("Auto_Mode", "true").await.unwrap_err();
    assert_eq!(err.status_code(), Some(StatusCode::UNCERTAIN));
}

#[tokio::test]
async fn test_write_empty_results() {
    let harness = ClientHarness::connected().await;
    harness.transport.script_write(WriteOutcome::Empty);

    let err = harness.client.write("Auto_Mode", "true").await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(ProtocolError::NoResults { .. })));
    assert_eq!(harness.client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_write_transport_error_is_not_retried() {
    let harness = ClientHarness::connected().await;
    harness
        .transport
        .script_write(WriteOutcome::Error("BadSecureChannelClosed".into()));

    let err = harness.client.write("Auto_Mode", "true").await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(ProtocolError::Transport { .. })));
    assert_eq!(harness.transport.writes().len(), 1);

    // The next write goes through normally.
    harness.client.write("Auto_Mode", "true").await.unwrap();
    assert_eq!(harness.transport.writes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_write_timeout() {
    let harness = ClientHarness::connected().await;
    harness.transport.set_write_delay(Duration::from_secs(10));

    let err = harness.client.write("Auto_Mode", "true").await.unwrap_err();
    match err {
        ClientError::Protocol(ProtocolError::Timeout { operation, duration }) => {
            assert_eq!(operation, "write");
            assert_eq!(duration, Duration::from_secs(2));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(harness.client.state(), ConnectionState::Connected);
}
