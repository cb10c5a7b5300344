// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Catalogs, configurations and values shared by the integration suites.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use uatag_core::{
    ClientConfig, DataType, DataValue, NodeAddress, ReconnectPolicy, StatusCode, TagCatalog,
    UnseenTagPolicy, Value,
};

/// Namespace of the PLC application variables.
pub const PLC_NAMESPACE: u16 = 4;

/// Builds a PLC application variable address.
pub fn plc_address(path: &str) -> NodeAddress {
    NodeAddress::string(
        PLC_NAMESPACE,
        format!("|var|CODESYS Control for Raspberry Pi MC SL.Application.{path}"),
    )
}

// =============================================================================
// Catalog Fixtures
// =============================================================================

/// Pre-built tag catalogs.
pub struct CatalogFixtures;

impl CatalogFixtures {
    /// Pick-and-place cell: one tag per writable type, one unaddressed sensor
    /// and one read-only DateTime tag.
    pub fn robot_cell() -> TagCatalog {
        TagCatalog::new()
            .tag("System_State", DataType::String, plc_address("PLC_PRG.System_State_String"))
            .tag(
                "DriveX.fActPosition",
                DataType::Double,
                plc_address("IoConfig_Globals.DriveX.fActPosition"),
            )
            .tag("X_postion", DataType::Double, plc_address("PLC_PRG.Position_to_set_in_Manuel.X"))
            .tag("Auto_Mode", DataType::Boolean, plc_address("PLC_PRG.Auto_Mode"))
            .tag("Manuel_Mode", DataType::Boolean, plc_address("PLC_PRG.Manuel_Mode"))
            .tag("Open_Gripper", DataType::Boolean, plc_address("AxisGroup_GVL.Open_Gripper"))
            .tag("Box_Count", DataType::Int32, plc_address("PLC_PRG.Box_Count"))
            .tag("Speed_Override", DataType::Int16, plc_address("PLC_PRG.Speed_Override"))
            .tag("Gripper_Force", DataType::Float, plc_address("PLC_PRG.Gripper_Force"))
            .tag("Last_Cycle", DataType::DateTime, plc_address("PLC_PRG.Last_Cycle"))
            .unaddressed("Sen5_", DataType::Boolean)
    }

    /// Names in [`robot_cell`](Self::robot_cell) that have an address.
    pub fn robot_cell_addressed() -> Vec<&'static str> {
        vec![
            "System_State",
            "DriveX.fActPosition",
            "X_postion",
            "Auto_Mode",
            "Manuel_Mode",
            "Open_Gripper",
            "Box_Count",
            "Speed_Override",
            "Gripper_Force",
            "Last_Cycle",
        ]
    }

    /// A catalog with a single boolean tag.
    pub fn single_switch() -> TagCatalog {
        TagCatalog::new().tag("Auto_Mode", DataType::Boolean, plc_address("PLC_PRG.Auto_Mode"))
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Pre-built client configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Reconnect interval used by [`client`](Self::client).
    pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(500);

    /// Unsecured local configuration with a short fixed reconnect interval.
    pub fn client() -> ClientConfig {
        ClientConfig::builder()
            .endpoint("opc.tcp://127.0.0.1:4840")
            .application_name("uatag-tests")
            .no_security()
            .write_timeout(Duration::from_secs(2))
            .reconnect(ReconnectPolicy::fixed(Self::RECONNECT_INTERVAL))
            .build()
            .expect("fixture config is valid")
    }

    /// Like [`client`](Self::client) but giving up after `attempts` failures.
    pub fn bounded(attempts: u32) -> ClientConfig {
        ClientConfig::builder()
            .endpoint("opc.tcp://127.0.0.1:4840")
            .application_name("uatag-tests")
            .no_security()
            .reconnect(ReconnectPolicy::fixed(Self::RECONNECT_INTERVAL).with_max_attempts(attempts))
            .build()
            .expect("fixture config is valid")
    }

    /// Like [`client`](Self::client) but rejecting unseen tags.
    pub fn strict() -> ClientConfig {
        let mut config = Self::client();
        config.unseen_tags = UnseenTagPolicy::Reject;
        config
    }

    /// YAML application configuration for the robot cell.
    pub fn yaml() -> &'static str {
        r#"
client:
  endpoint: "opc.tcp://127.0.0.1:4840"
  application_name: UnityOPCClient
  write_timeout: 3s
  security:
    policy: None
    mode: None
  subscription:
    publishing_interval: 250ms
    sampling_interval: 250ms
  reconnect:
    interval: 2s
    strategy: exponential
    max_interval: 30s

tags:
  - name: System_State
    data_type: String
    address: "ns=4;s=PLC_PRG.System_State_String"
  - name: X_postion
    data_type: Double
    address: "ns=4;s=PLC_PRG.Position_to_set_in_Manuel.X"
  - name: Auto_Mode
    data_type: Boolean
    address: "ns=4;s=PLC_PRG.Auto_Mode"
  - name: Sen5_
    data_type: Boolean

logging:
  level: debug
  format: json
"#
    }

    /// Path of the sample configuration shipped with the repository.
    pub fn sample_file() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../config/uatag.yaml")
    }
}

// =============================================================================
// Value Fixtures
// =============================================================================

/// Pre-built notification values.
pub struct ValueFixtures;

impl ValueFixtures {
    /// A fixed source timestamp.
    pub fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53)
            .single()
            .expect("valid timestamp")
    }

    /// A Good value at [`timestamp`](Self::timestamp).
    pub fn good(value: Value) -> DataValue {
        DataValue::at(value, Self::timestamp())
    }

    /// A value with a non-Good status.
    pub fn with_status(value: Value, status: StatusCode) -> DataValue {
        DataValue {
            status,
            ..Self::good(value)
        }
    }

    /// An empty value without a source timestamp.
    pub fn null() -> DataValue {
        DataValue {
            value: Value::Null,
            source_timestamp: None,
            status: StatusCode::GOOD,
        }
    }
}
