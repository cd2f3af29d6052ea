// crates/shardlink-core/tests/concurrent_map.rs
// ============================================================================
// Module: Concurrent Map Tests
// Description: Targeted tests for the generic reader/writer-locked map.
// Purpose: Validate copy-out iteration, clone independence, and safety under
//          concurrent callers.
// ============================================================================

//! ## Overview
//! Unit-level tests for the concurrent map:
//! - Basic get/set/delete/len contracts
//! - Snapshots and clones are independent of later mutation
//! - Concurrent writers and readers do not lose entries
//! - Sequences of operations agree with a plain map model

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::HashMap;
use std::thread;

use proptest::prelude::*;
use shardlink_core::ConcurrentMap;

// ============================================================================
// SECTION: Basic Contracts
// ============================================================================

#[test]
fn set_get_delete_roundtrip() {
    let map: ConcurrentMap<String, u64> = ConcurrentMap::new();
    assert!(map.is_empty());
    assert_eq!(map.get(&"a".to_string()), None);

    map.set("a".to_string(), 1);
    map.set("b".to_string(), 2);
    assert_eq!(map.get(&"a".to_string()), Some(1));
    assert_eq!(map.len(), 2);

    map.set("a".to_string(), 3);
    assert_eq!(map.get(&"a".to_string()), Some(3));
    assert_eq!(map.len(), 2);

    map.delete(&"a".to_string());
    assert_eq!(map.get(&"a".to_string()), None);
    assert_eq!(map.len(), 1);
}

#[test]
fn delete_of_a_missing_key_is_a_silent_noop() {
    let map: ConcurrentMap<String, u64> = ConcurrentMap::new();
    map.delete(&"missing".to_string());
    assert!(map.is_empty());
}

#[test]
fn keys_and_values_are_copies() {
    let map: ConcurrentMap<String, u64> = ConcurrentMap::new();
    map.set("a".to_string(), 1);
    map.set("b".to_string(), 2);

    let mut keys = map.keys();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

    let mut values = map.values();
    values.sort_unstable();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn snapshot_is_independent_of_later_mutation() {
    let map: ConcurrentMap<String, u64> = ConcurrentMap::new();
    map.set("a".to_string(), 1);
    let snapshot = map.snapshot();

    map.set("a".to_string(), 2);
    map.set("b".to_string(), 3);

    assert_eq!(snapshot.get("a"), Some(&1));
    assert!(!snapshot.contains_key("b"));
}

#[test]
fn clone_is_independent_of_the_original() {
    let map: ConcurrentMap<String, u64> = ConcurrentMap::new();
    map.set("a".to_string(), 1);
    let cloned = map.clone();

    map.set("a".to_string(), 2);
    cloned.set("b".to_string(), 3);

    assert_eq!(map.get(&"a".to_string()), Some(2));
    assert_eq!(map.get(&"b".to_string()), None);
    assert_eq!(cloned.get(&"a".to_string()), Some(1));
    assert_eq!(cloned.get(&"b".to_string()), Some(3));
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn concurrent_writers_do_not_lose_entries() {
    let map: ConcurrentMap<u64, u64> = ConcurrentMap::new();
    thread::scope(|scope| {
        for writer in 0 .. 4_u64 {
            let map = &map;
            scope.spawn(move || {
                for index in 0 .. 100_u64 {
                    map.set(writer * 100 + index, index);
                }
            });
        }
    });
    assert_eq!(map.len(), 400);
}

#[test]
fn readers_proceed_while_writers_mutate() {
    let map: ConcurrentMap<u64, u64> = ConcurrentMap::new();
    map.set(0, 0);
    thread::scope(|scope| {
        let writer_map = &map;
        scope.spawn(move || {
            for index in 1 .. 200_u64 {
                writer_map.set(index, index);
            }
        });
        let reader_map = &map;
        scope.spawn(move || {
            for _ in 0 .. 200 {
                let snapshot = reader_map.snapshot();
                assert_eq!(snapshot.get(&0), Some(&0));
            }
        });
    });
}

// ============================================================================
// SECTION: Model Properties
// ============================================================================

/// One map operation for the model property below.
#[derive(Debug, Clone)]
enum MapOp {
    /// Upsert a key/value pair.
    Set(u8, u64),
    /// Delete a key.
    Delete(u8),
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        (any::<u8>(), any::<u64>()).prop_map(|(key, value)| MapOp::Set(key, value)),
        any::<u8>().prop_map(MapOp::Delete),
    ]
}

proptest! {
    #[test]
    fn operation_sequences_agree_with_a_plain_map(ops in proptest::collection::vec(map_op(), 0 .. 64)) {
        let map: ConcurrentMap<u8, u64> = ConcurrentMap::new();
        let mut model: HashMap<u8, u64> = HashMap::new();
        for op in ops {
            match op {
                MapOp::Set(key, value) => {
                    map.set(key, value);
                    model.insert(key, value);
                }
                MapOp::Delete(key) => {
                    map.delete(&key);
                    model.remove(&key);
                }
            }
        }
        prop_assert_eq!(map.snapshot(), model.clone());
        prop_assert_eq!(map.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(map.get(key), Some(*value));
        }
    }
}
