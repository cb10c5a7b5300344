// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Queue Integration Tests
//!
//! Hand-off between notification producers and the single consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use uatag_core::{ActionQueue, ClientError, DataValue, PendingAction, Tag, TagUpdateListener, Value};

use uatag_tests::prelude::*;

fn action(tag: &str, value: i32) -> PendingAction {
    PendingAction::new(tag, DataValue::now(Value::Int32(value)))
}

// =============================================================================
// ActionQueue
// =============================================================================

#[test]
fn test_queue_applies_in_push_order_exactly_once() {
    let queue = ActionQueue::new();
    queue.push(action("Box_Count", 1));
    queue.push(action("Speed_Override", 2));
    queue.push(action("Box_Count", 3));

    let mut seen = Vec::new();
    let report = queue.drain_all(|a| {
        seen.push((a.tag.clone(), a.value.clone()));
        Ok(())
    });

    assert_eq!(report.applied, 3);
    assert_eq!(
        seen,
        vec![
            ("Box_Count".to_string(), Value::Int32(1)),
            ("Speed_Override".to_string(), Value::Int32(2)),
            ("Box_Count".to_string(), Value::Int32(3)),
        ]
    );

    // Drained actions are gone.
    assert!(queue.is_empty());
    assert!(queue.drain_all(|_| Ok(())).is_empty());
}

#[test]
fn test_queue_failure_does_not_block_later_actions() {
    let queue = ActionQueue::new();
    queue.push(action("A", 1));
    queue.push(action("B", 2));
    queue.push(action("C", 3));
    queue.push(action("D", 4));

    let mut applied = Vec::new();
    let report = queue.drain_all(|a| match a.tag.as_str() {
        "B" => Err(ClientError::unknown_tag("B")),
        "C" => panic!("listener blew up"),
        _ => {
            applied.push(a.tag.clone());
            Ok(())
        }
    });

    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(applied, vec!["A", "D"]);
    assert_eq!(queue.stats().failed(), 2);
}

#[test]
fn test_queue_concurrent_producers() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: i32 = 500;

    let queue = Arc::new(ActionQueue::new());
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.push(action(&format!("producer-{p}"), i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }

    let mut last_sequence = None;
    let mut per_producer: HashMap<String, Vec<i32>> = HashMap::new();
    let report = queue.drain_all(|a| {
        if let Some(last) = last_sequence {
            assert!(a.sequence > last, "sequence must increase in drain order");
        }
        last_sequence = Some(a.sequence);
        if let Value::Int32(v) = a.value {
            per_producer.entry(a.tag.clone()).or_default().push(v);
        }
        Ok(())
    });

    assert_eq!(report.applied, PRODUCERS * PER_PRODUCER as usize);
    assert_eq!(queue.stats().pushed(), (PRODUCERS * PER_PRODUCER as usize) as u64);
    assert_eq!(per_producer.len(), PRODUCERS);
    let expected: Vec<i32> = (0..PER_PRODUCER).collect();
    for values in per_producer.values() {
        assert_eq!(values, &expected);
    }
}

#[test]
fn test_queue_push_while_draining_waits_for_next_cycle() {
    let queue = Arc::new(ActionQueue::new());
    queue.push(action("A", 1));

    let producer = Arc::clone(&queue);
    let report = queue.drain_all(|_| {
        producer.push(action("B", 2));
        Ok(())
    });
    assert_eq!(report.applied, 1);
    assert_eq!(queue.len(), 1);

    let report = queue.drain_all(|a| {
        assert_eq!(a.tag, "B");
        Ok(())
    });
    assert_eq!(report.applied, 1);
}

// =============================================================================
// Through the client
// =============================================================================

#[tokio::test]
async fn test_client_drain_preserves_notification_order() {
    let mut harness = ClientHarness::connected().await;

    harness.notify("Box_Count", Value::Int32(1));
    harness.notify("Auto_Mode", Value::Boolean(true));
    harness.notify_values(
        "Box_Count",
        vec![
            DataValue::now(Value::Int32(2)),
            DataValue::now(Value::Int32(3)),
        ],
    );
    assert_eq!(harness.client.pending(), 4);

    let report = harness.drain();
    assert_eq!(report.applied, 4);

    let updates: Vec<(String, String)> = harness
        .take_updates()
        .into_iter()
        .map(|t| (t.display_name, t.value))
        .collect();
    assert_eq!(
        updates,
        vec![
            ("Box_Count".to_string(), "1".to_string()),
            ("Auto_Mode".to_string(), "true".to_string()),
            ("Box_Count".to_string(), "2".to_string()),
            ("Box_Count".to_string(), "3".to_string()),
        ]
    );
    assert_eq!(harness.value("Box_Count").as_deref(), Some("3"));
}

#[tokio::test]
async fn test_client_notifications_from_many_threads() {
    let harness = ClientHarness::connected().await;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let transport = Arc::clone(&harness.transport);
            thread::spawn(move || {
                for n in 0..100 {
                    assert!(transport.notify("Box_Count", Value::Int32(i * 1000 + n)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }

    assert_eq!(harness.drain().applied, 400);
    assert_eq!(harness.client.dispatcher().stats().notifications(), 400);
}

struct PanickingListener;

impl TagUpdateListener for PanickingListener {
    fn on_tag_updated(&self, tag: &Tag) {
        if tag.display_name == "Open_Gripper" {
            panic!("renderer crashed on {}", tag.display_name);
        }
    }
}

#[tokio::test]
async fn test_client_panicking_listener_is_isolated() {
    let harness = ClientHarness::connected().await;
    harness.client.add_listener(Arc::new(PanickingListener));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    harness.client.add_listener(Arc::new(move |tag: &Tag| {
        recorder.lock().push(tag.display_name.clone());
    }));

    harness.notify("Auto_Mode", Value::Boolean(true));
    harness.notify("Open_Gripper", Value::Boolean(true));
    harness.notify("Manuel_Mode", Value::Boolean(false));

    let report = harness.drain();
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);

    // The panic stopped the remaining listeners for that action only.
    assert_eq!(*seen.lock(), vec!["Auto_Mode", "Manuel_Mode"]);
    assert_eq!(harness.value("Manuel_Mode").as_deref(), Some("false"));
}

/// Registers a recording listener from inside its own first callback.
struct RegisteringListener {
    client: std::sync::Weak<uatag_core::TagClient>,
    registered: AtomicUsize,
    seen: Arc<Mutex<Vec<String>>>,
}

impl TagUpdateListener for RegisteringListener {
    fn on_tag_updated(&self, _tag: &Tag) {
        if self.registered.fetch_add(1, Ordering::SeqCst) > 0 {
            return;
        }
        let Some(client) = self.client.upgrade() else {
            return;
        };
        let recorder = Arc::clone(&self.seen);
        client.add_listener(Arc::new(move |tag: &Tag| {
            recorder.lock().push(tag.display_name.clone());
        }));
    }
}

#[tokio::test]
async fn test_client_listener_may_register_listener() {
    let harness = ClientHarness::connected().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    harness.client.add_listener(Arc::new(RegisteringListener {
        client: Arc::downgrade(&harness.client),
        registered: AtomicUsize::new(0),
        seen: Arc::clone(&seen),
    }));

    harness.notify("Auto_Mode", Value::Boolean(true));
    harness.notify("Box_Count", Value::Int32(3));

    let report = harness.drain();
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 0);

    // Added during the first update, so it only sees the second.
    assert_eq!(*seen.lock(), vec!["Box_Count"]);
}

#[tokio::test]
async fn test_client_listener_called_once_per_applied_action() {
    let harness = ClientHarness::connected().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    harness.client.add_listener(Arc::new(move |_: &Tag| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    for i in 0..10 {
        harness.notify("Box_Count", Value::Int32(i));
    }
    harness.drain();
    harness.drain();

    assert_eq!(calls.load(Ordering::SeqCst), 10);
}
