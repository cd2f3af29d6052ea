// crates/shardlink-config/tests/topology_validation.rs
// ============================================================================
// Module: Topology Validation Tests
// Description: Targeted tests for topology consistency checks.
// Purpose: Validate duplicate-key detection, field limits, and descriptor
//          conversion.
// ============================================================================

//! ## Overview
//! Unit-level tests for topology validation:
//! - Empty topologies and empty fields fail closed
//! - Duplicate keys are rejected across the flat shard+replica namespace
//! - Replica and length limits are enforced
//! - Conversion to shard descriptors preserves order

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

use shardlink_config::ConfigError;
use shardlink_config::ShardingConfig;
use shardlink_core::ShardKey;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_with_shards(shards: &str) -> Result<ShardingConfig, ConfigError> {
    ShardingConfig::from_toml(shards)
}

// ============================================================================
// SECTION: Structural Validation
// ============================================================================

#[test]
fn an_empty_topology_fails_closed() {
    let err = config_with_shards("shards = []").expect_err("must fail");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn empty_fields_fail_closed() {
    for content in [
        "[[shards]]\nkey = \"\"\ndriver = \"sqlite\"\ndsn = \"x\"\n",
        "[[shards]]\nkey = \"db1\"\ndriver = \"\"\ndsn = \"x\"\n",
        "[[shards]]\nkey = \"db1\"\ndriver = \"sqlite\"\ndsn = \"\"\n",
    ] {
        let err = config_with_shards(content).expect_err("must fail");
        assert!(matches!(err, ConfigError::Invalid(_)), "content: {content}");
    }
}

#[test]
fn an_overlong_key_fails_closed() {
    let key = "k".repeat(129);
    let content = format!("[[shards]]\nkey = \"{key}\"\ndriver = \"sqlite\"\ndsn = \"x\"\n");
    let err = config_with_shards(&content).expect_err("must fail");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn too_many_replicas_fail_closed() {
    let mut content = String::from("[[shards]]\nkey = \"db1\"\ndriver = \"sqlite\"\ndsn = \"x\"\n");
    for index in 0 .. 17 {
        content.push_str(&format!(
            "[[shards.replicas]]\nkey = \"r{index}\"\ndriver = \"sqlite\"\ndsn = \"x\"\n"
        ));
    }
    let err = config_with_shards(&content).expect_err("must fail");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

// ============================================================================
// SECTION: Duplicate Keys
// ============================================================================

#[test]
fn duplicate_shard_keys_are_rejected() {
    let content = r#"
[[shards]]
key = "db1"
driver = "sqlite"
dsn = "a"

[[shards]]
key = "db1"
driver = "sqlite"
dsn = "b"
"#;
    let err = config_with_shards(content).expect_err("must fail");
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("duplicate key"));
}

#[test]
fn replica_keys_share_the_flat_namespace_with_shards() {
    let content = r#"
[[shards]]
key = "db1"
driver = "sqlite"
dsn = "a"

[[shards]]
key = "db2"
driver = "sqlite"
dsn = "b"

  [[shards.replicas]]
  key = "db1"
  driver = "sqlite"
  dsn = "c"
"#;
    let err = config_with_shards(content).expect_err("must fail");
    assert!(err.to_string().contains("duplicate key: db1"));
}

#[test]
fn duplicate_replica_keys_across_shards_are_rejected() {
    let content = r#"
[[shards]]
key = "db1"
driver = "sqlite"
dsn = "a"

  [[shards.replicas]]
  key = "r1"
  driver = "sqlite"
  dsn = "b"

[[shards]]
key = "db2"
driver = "sqlite"
dsn = "c"

  [[shards.replicas]]
  key = "r1"
  driver = "sqlite"
  dsn = "d"
"#;
    let err = config_with_shards(content).expect_err("must fail");
    assert!(err.to_string().contains("duplicate key: r1"));
}

// ============================================================================
// SECTION: Descriptor Conversion
// ============================================================================

#[test]
fn into_specs_preserves_shard_and_replica_order() {
    let content = r#"
[[shards]]
key = "db1"
driver = "sqlite"
dsn = "a"

  [[shards.replicas]]
  key = "db1-r1"
  driver = "sqlite"
  dsn = "b"

  [[shards.replicas]]
  key = "db1-r2"
  driver = "sqlite"
  dsn = "c"

[[shards]]
key = "db2"
driver = "sqlite"
dsn = "d"
"#;
    let specs = config_with_shards(content).expect("parse").into_specs();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].key, ShardKey::new("db1"));
    assert_eq!(specs[1].key, ShardKey::new("db2"));
    let replica_keys: Vec<&str> =
        specs[0].replicas.iter().map(|replica| replica.key.as_str()).collect();
    assert_eq!(replica_keys, vec!["db1-r1", "db1-r2"]);
    assert_eq!(specs[0].dsn, "a");
}
