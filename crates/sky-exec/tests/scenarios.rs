//! End-to-end scenarios from spec.md §8: schema declared, events ingested
//! into a `MemoryStore`, query run through `Executor`, result JSON checked
//! against the documented shape.

use std::collections::HashMap;

use serde_json::json;

use sky_core::{encode_event, Event, Value};
use sky_exec::{Executor, ExecutorConfig, EVENTS_SPACE};
use sky_primitives::Timestamp;
use sky_schema::{DataType, SchemaRegistry};
use sky_storage::{MemoryStore, StorageWriter};

fn put_event(store: &mut MemoryStore, object_id: &[u8], timestamp_secs: i64, fields: &[(&str, Value)], ids: &HashMap<&str, sky_primitives::PropertyId>) {
    let mut values = HashMap::new();
    for (name, value) in fields {
        values.insert(ids[name], value.clone());
    }
    let event = Event { timestamp: Timestamp::from_micros(timestamp_secs * 1_000_000), values };
    let encoded = encode_event(&event);
    store
        .put_at(EVENTS_SPACE, object_id, &event.timestamp.as_micros().to_be_bytes(), encoded)
        .unwrap();
}

/// Scenarios 1 and 2 share one dataset: 5 events across 4 objects, one
/// `fruit` value per object (object `o4` never sets it).
fn fruit_dataset() -> (SchemaRegistry, MemoryStore) {
    let mut registry = SchemaRegistry::new();
    let fruit = registry.table_or_create("foo").declare_property("fruit", DataType::String, false).unwrap();
    let ids = HashMap::from([("fruit", fruit)]);

    let mut store = MemoryStore::new();
    store.open(EVENTS_SPACE, true).unwrap();
    put_event(&mut store, b"o1", 0, &[("fruit", Value::String("apple".into()))], &ids);
    put_event(&mut store, b"o1", 10, &[("fruit", Value::String("apple".into()))], &ids);
    put_event(&mut store, b"o2", 0, &[("fruit", Value::String("grape".into()))], &ids);
    put_event(&mut store, b"o3", 0, &[("fruit", Value::String("orange".into()))], &ids);
    put_event(&mut store, b"o4", 0, &[], &ids);
    (registry, store)
}

#[test]
fn scenario_1_simple_count() {
    let (registry, store) = fruit_dataset();
    let snapshot = store.snapshot();
    let executor = Executor::new(&registry, &snapshot, ExecutorConfig::new());

    let query = r#"{
        "table": "foo",
        "steps": [
            {"type": "selection", "dimensions": [], "fields": [{"name": "count", "expression": "count()"}]}
        ]
    }"#;
    let (result, _stats) = executor.execute(query, None).unwrap();
    assert_eq!(result, json!({"count": 5}));
}

#[test]
fn scenario_2_one_dimension_count() {
    let (registry, store) = fruit_dataset();
    let snapshot = store.snapshot();
    let executor = Executor::new(&registry, &snapshot, ExecutorConfig::new());

    let query = r#"{
        "table": "foo",
        "steps": [
            {"type": "selection", "dimensions": ["fruit"], "fields": [{"name": "count", "expression": "count()"}]}
        ]
    }"#;
    let (result, _stats) = executor.execute(query, None).unwrap();
    assert_eq!(
        result,
        json!({
            "fruit": {
                "": {"count": 1},
                "apple": {"count": 2},
                "grape": {"count": 1},
                "orange": {"count": 1}
            }
        })
    );
}

#[test]
fn scenario_3_funnel_within_window() {
    let mut registry = SchemaRegistry::new();
    let action = registry.table_or_create("foo").declare_property("action", DataType::String, false).unwrap();
    let ids = HashMap::from([("action", action)]);

    let mut store = MemoryStore::new();
    store.open(EVENTS_SPACE, true).unwrap();
    // object d0: two independent A0->A1 matches, far enough apart not to overlap
    put_event(&mut store, b"d0", 0, &[("action", Value::String("A0".into()))], &ids);
    put_event(&mut store, b"d0", 1, &[("action", Value::String("A1".into()))], &ids);
    put_event(&mut store, b"d0", 2, &[("action", Value::String("A2".into()))], &ids);
    put_event(&mut store, b"d0", 1000, &[("action", Value::String("A0".into()))], &ids);
    put_event(&mut store, b"d0", 1001, &[("action", Value::String("A2".into()))], &ids);
    put_event(&mut store, b"d0", 1002, &[("action", Value::String("A1".into()))], &ids);
    // object e1: one match
    put_event(&mut store, b"e1", 0, &[("action", Value::String("A0".into()))], &ids);
    put_event(&mut store, b"e1", 1, &[("action", Value::String("A1".into()))], &ids);

    let snapshot = store.snapshot();
    let executor = Executor::new(&registry, &snapshot, ExecutorConfig::new());

    let query = r#"{
        "table": "foo",
        "steps": [
            {
                "type": "condition",
                "expression": "action == 'A0'",
                "steps": [
                    {
                        "type": "condition",
                        "expression": "action == 'A1'",
                        "within": [1, 2],
                        "steps": [
                            {"type": "selection", "dimensions": ["action"], "fields": [{"name": "count", "expression": "count()"}]}
                        ]
                    }
                ]
            }
        ]
    }"#;
    let (result, _stats) = executor.execute(query, None).unwrap();
    assert_eq!(result, json!({"action": {"A1": {"count": 3}}}));
}

#[test]
fn scenario_4_sessionized_funnel_does_not_cross_session_boundary() {
    let mut registry = SchemaRegistry::new();
    let action = registry.table_or_create("foo").declare_property("action", DataType::String, false).unwrap();
    let ids = HashMap::from([("action", action)]);

    let mut store = MemoryStore::new();
    store.open(EVENTS_SPACE, true).unwrap();
    // same session: gap well under the 7200s idle threshold
    put_event(&mut store, b"f0", 0, &[("action", Value::String("A0".into()))], &ids);
    put_event(&mut store, b"f0", 7199, &[("action", Value::String("A1".into()))], &ids);
    // different session: gap well over the idle threshold, then a fresh A0/A1 pair
    put_event(&mut store, b"f0", 100_000, &[("action", Value::String("A0".into()))], &ids);
    put_event(&mut store, b"f0", 107_201, &[("action", Value::String("A1".into()))], &ids);

    let snapshot = store.snapshot();
    let executor = Executor::new(&registry, &snapshot, ExecutorConfig::new());

    let query = r#"{
        "table": "foo",
        "sessionIdleTime": 7200,
        "steps": [
            {
                "type": "condition",
                "expression": "action == 'A0'",
                "steps": [
                    {
                        "type": "condition",
                        "expression": "action == 'A1'",
                        "within": [1, 1],
                        "steps": [
                            {"type": "selection", "dimensions": ["action"], "fields": [{"name": "count", "expression": "count()"}]}
                        ]
                    }
                ]
            }
        ]
    }"#;
    let (result, _stats) = executor.execute(query, None).unwrap();
    assert_eq!(result, json!({"action": {"A1": {"count": 1}}}));
}

#[test]
fn scenario_5_timestamp_predicate_with_sum() {
    let mut registry = SchemaRegistry::new();
    let action = registry.table_or_create("foo").declare_property("action", DataType::String, false).unwrap();
    let ids = HashMap::from([("action", action)]);

    let mut store = MemoryStore::new();
    store.open(EVENTS_SPACE, true).unwrap();
    put_event(&mut store, b"h0", 0, &[("action", Value::String("A1".into()))], &ids);
    put_event(&mut store, b"h1", 1, &[("action", Value::String("A2".into()))], &ids);
    put_event(&mut store, b"h2", 2, &[("action", Value::String("A1".into()))], &ids);
    put_event(&mut store, b"h3", 2, &[("action", Value::String("A5".into()))], &ids);
    put_event(&mut store, b"h4", 2, &[("action", Value::String("A5".into()))], &ids);
    put_event(&mut store, b"h5", 4, &[("action", Value::String("A2".into()))], &ids);
    put_event(&mut store, b"h6", 6, &[("action", Value::String("A9".into()))], &ids);

    let snapshot = store.snapshot();
    let executor = Executor::new(&registry, &snapshot, ExecutorConfig::new());

    let query = r#"{
        "table": "foo",
        "steps": [
            {
                "type": "condition",
                "expression": "timestamp >= 2 && timestamp < 6",
                "steps": [
                    {
                        "type": "selection",
                        "dimensions": ["action"],
                        "fields": [
                            {"name": "count", "expression": "count()"},
                            {"name": "tsSum", "expression": "sum(timestamp)"}
                        ]
                    }
                ]
            }
        ]
    }"#;
    let (result, _stats) = executor.execute(query, None).unwrap();

    let action_field = result.get("action").unwrap();
    let a1 = action_field.get("A1").unwrap();
    assert_eq!(a1.get("count").unwrap().as_u64(), Some(1));
    assert_eq!(a1.get("tsSum").unwrap().as_f64(), Some(2.0));

    let a2 = action_field.get("A2").unwrap();
    assert_eq!(a2.get("count").unwrap().as_u64(), Some(1));
    assert_eq!(a2.get("tsSum").unwrap().as_f64(), Some(4.0));

    let a5 = action_field.get("A5").unwrap();
    assert_eq!(a5.get("count").unwrap().as_u64(), Some(2));
    assert_eq!(a5.get("tsSum").unwrap().as_f64(), Some(4.0));

    assert!(action_field.get("A9").is_none());
}

#[test]
fn scenario_6_prefix_scan() {
    let mut registry = SchemaRegistry::new();
    let price = registry.table_or_create("prices").declare_property("price", DataType::Float, false).unwrap();
    let ids = HashMap::from([("price", price)]);

    let mut store = MemoryStore::new();
    store.open(EVENTS_SPACE, true).unwrap();
    put_event(&mut store, b"0010a", 0, &[("price", Value::Float(100.0))], &ids);
    put_event(&mut store, b"0010b", 0, &[("price", Value::Float(200.0))], &ids);
    put_event(&mut store, b"0020a", 0, &[("price", Value::Float(999.0))], &ids);
    put_event(&mut store, b"0030a", 0, &[("price", Value::Float(111.0))], &ids);

    let snapshot = store.snapshot();
    let executor = Executor::new(&registry, &snapshot, ExecutorConfig::new());

    let query = r#"{
        "table": "prices",
        "prefix": "001",
        "steps": [
            {"type": "selection", "dimensions": [], "fields": [{"name": "sum", "expression": "sum(price)"}]}
        ]
    }"#;
    let (result, _stats) = executor.execute(query, None).unwrap();
    assert_eq!(result.get("sum").unwrap().as_f64(), Some(300.0));
}

#[test]
fn stats_counts_objects_optionally_scoped_by_prefix() {
    let mut registry = SchemaRegistry::new();
    let price = registry.table_or_create("prices").declare_property("price", DataType::Float, false).unwrap();
    let ids = HashMap::from([("price", price)]);

    let mut store = MemoryStore::new();
    store.open(EVENTS_SPACE, true).unwrap();
    put_event(&mut store, b"0010a", 0, &[("price", Value::Float(100.0))], &ids);
    put_event(&mut store, b"0010b", 0, &[("price", Value::Float(200.0))], &ids);
    put_event(&mut store, b"0020a", 0, &[("price", Value::Float(999.0))], &ids);
    put_event(&mut store, b"0030a", 0, &[("price", Value::Float(111.0))], &ids);

    let snapshot = store.snapshot();
    let executor = Executor::new(&registry, &snapshot, ExecutorConfig::new());

    assert_eq!(executor.stats("prices", None).unwrap(), json!({"count": 4}));
    assert_eq!(executor.stats("prices", Some("001")).unwrap(), json!({"count": 2}));
    assert_eq!(executor.stats("prices", Some("003")).unwrap(), json!({"count": 1}));
    assert_eq!(executor.stats("prices", Some("099")).unwrap(), json!({"count": 0}));
}
