// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Registry Integration Tests
//!
//! - `test_registry_*`: catalog registration and lookup
//! - `test_resolver_*`: name to address table
//! - `test_apply_*`: how drained notifications land in the cache

use std::collections::HashSet;

use uatag_core::{
    AddressResolver, DataType, NodeAddress, StatusCode, TagRegistry, UnseenTagPolicy, Value,
};

use uatag_tests::prelude::*;

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_registry_every_catalog_tag_found_once() {
    let catalog = CatalogFixtures::robot_cell();
    let registry = catalog.registry();

    assert_eq!(registry.len(), catalog.len());
    for entry in catalog.entries() {
        let tag = registry.find(&entry.name).expect("catalog tag registered");
        assert_eq!(tag.display_name, entry.name);
        assert_eq!(tag.data_type, entry.data_type);
        assert!(!tag.has_value());
    }
    let unique: HashSet<String> = registry.names().into_iter().collect();
    assert_eq!(unique.len(), registry.len());
}

#[test]
fn test_registry_reregistering_never_duplicates() {
    let registry = TagRegistry::from_catalog([
        ("Auto_Mode", DataType::Boolean),
        ("X_postion", DataType::Double),
    ]);

    assert!(!registry.register("Auto_Mode", DataType::Boolean));
    assert!(!registry.register("Auto_Mode", DataType::String));
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.data_type("Auto_Mode"), Some(DataType::Boolean));

    assert!(registry.register("Manuel_Mode", DataType::Boolean));
    assert_eq!(registry.names(), vec!["Auto_Mode", "X_postion", "Manuel_Mode"]);
}

#[test]
fn test_registry_lookup_is_exact() {
    let registry = CatalogFixtures::robot_cell().registry();
    assert!(registry.find("auto_mode").is_none());
    assert!(registry.find("Auto_Mode ").is_none());
    assert!(registry.contains("Auto_Mode"));
}

// =============================================================================
// Resolver
// =============================================================================

#[test]
fn test_resolver_built_from_catalog() {
    let resolver = CatalogFixtures::robot_cell().resolver();

    assert_eq!(resolver.len(), CatalogFixtures::robot_cell_addressed().len());
    assert_eq!(
        resolver.resolve("Open_Gripper"),
        Some(&plc_address("AxisGroup_GVL.Open_Gripper"))
    );
    assert!(resolver.resolve("Sen5_").is_none());
    assert!(resolver.resolve("Unknown").is_none());
}

#[test]
fn test_resolver_extendable_without_code() {
    let resolver = AddressResolver::new()
        .with("CurrentTime", NodeAddress::numeric(0, 2258))
        .with("Auto_Mode", plc_address("PLC_PRG.Auto_Mode"));

    assert_eq!(resolver.resolve("CurrentTime").map(ToString::to_string).as_deref(), Some("i=2258"));
    assert_eq!(resolver.len(), 2);
}

// =============================================================================
// Applying notifications
// =============================================================================

#[tokio::test]
async fn test_apply_updates_value_timestamp_and_type() {
    let mut harness = ClientHarness::connected().await;

    harness.notify_values("X_postion", vec![ValueFixtures::good(Value::Double(12.5))]);
    let report = harness.drain();
    assert_eq!(report.applied, 1);

    let tag = harness.client.tag("X_postion").unwrap();
    assert_eq!(tag.value, "12.5");
    assert_eq!(tag.data_type, DataType::Double);
    assert_eq!(tag.source_timestamp, ValueFixtures::timestamp().to_rfc3339());

    let updates = harness.take_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0], tag);
}

#[tokio::test]
async fn test_apply_observed_type_wins() {
    let harness = ClientHarness::connected().await;

    // The PLC reports the position as a float even though it was declared Double.
    harness.notify("X_postion", Value::Float(1.5));
    harness.drain();

    assert_eq!(harness.client.tag("X_postion").unwrap().data_type, DataType::Float);
}

#[tokio::test]
async fn test_apply_null_keeps_known_type() {
    let harness = ClientHarness::connected().await;

    harness.notify_values("Auto_Mode", vec![ValueFixtures::null()]);
    assert_eq!(harness.drain().applied, 1);

    let tag = harness.client.tag("Auto_Mode").unwrap();
    assert_eq!(tag.data_type, DataType::Boolean);
    assert_eq!(tag.value, "");
    assert_eq!(tag.source_timestamp, "");
}

#[tokio::test]
async fn test_apply_bad_status_is_still_cached() {
    let harness = ClientHarness::connected().await;

    harness.notify_values(
        "System_State",
        vec![ValueFixtures::with_status(
            Value::String("Fault".into()),
            StatusCode::BAD_COMMUNICATION_ERROR,
        )],
    );
    assert_eq!(harness.drain().applied, 1);
    assert_eq!(harness.value("System_State").as_deref(), Some("Fault"));
}

#[tokio::test]
async fn test_apply_unseen_tag_accepted_by_default() {
    let mut harness = ClientHarness::connected().await;
    let before = harness.client.registry().len();

    harness.notify("CurrentTime", Value::DateTime(ValueFixtures::timestamp()));
    assert_eq!(harness.drain().applied, 1);

    let registry = harness.client.registry();
    assert_eq!(registry.len(), before + 1);
    assert_eq!(registry.names().last().map(String::as_str), Some("CurrentTime"));
    assert_eq!(registry.data_type("CurrentTime"), Some(DataType::DateTime));
    assert_eq!(harness.take_updates().len(), 1);
}

#[tokio::test]
async fn test_apply_unseen_tag_rejected_by_strict_policy() {
    let mut harness = ClientHarness::with(ConfigFixtures::strict(), CatalogFixtures::robot_cell());
    harness.start().await;
    assert_eq!(harness.client.connection().config().unseen_tags, UnseenTagPolicy::Reject);
    let before = harness.client.registry().len();

    harness.notify("CurrentTime", Value::DateTime(ValueFixtures::timestamp()));
    harness.notify("Auto_Mode", Value::Boolean(true));
    let report = harness.drain();

    assert_eq!(report.failed, 1);
    assert_eq!(report.applied, 1);
    assert_eq!(harness.client.registry().len(), before);
    assert!(harness.client.tag("CurrentTime").is_none());

    let updates = harness.take_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].display_name, "Auto_Mode");
}

#[tokio::test]
async fn test_apply_unaddressed_tag_updated_by_notification() {
    let harness = ClientHarness::connected().await;

    // Not subscribed, but a notification under its name still lands.
    assert!(!harness.transport.monitored_names().contains(&"Sen5_".to_string()));
    harness.notify("Sen5_", Value::Boolean(true));
    harness.drain();

    assert_eq!(harness.value("Sen5_").as_deref(), Some("true"));
}
