// crates/shardlink-core/tests/replication_commit.rs
// ============================================================================
// Module: Replication Coordinator Tests
// Description: Targeted tests for the synchronous replication commit protocol.
// Purpose: Validate commit-all-or-rollback-all semantics, replica
//          short-circuiting, and composite error reporting.
// ============================================================================

//! ## Overview
//! Unit-level tests for the replication commit protocol:
//! - Strategy `All` commits every opened transaction or rolls every one back
//! - Replica fan-out stops at the first failure; later replicas never begin
//! - Strategy `None` wraps the shard statement in its own envelope
//! - Strategy `Some` is reserved and rejected
//! - Commit and rollback failures are collected, never discarded

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

use shardlink_core::DriverRegistry;
use shardlink_core::ExecuteError;
use shardlink_core::MemoryDriver;
use shardlink_core::RegistryError;
use shardlink_core::ReplicaSpec;
use shardlink_core::ReplicationCoordinator;
use shardlink_core::ReplicationStrategy;
use shardlink_core::ShardKey;
use shardlink_core::ShardRegistry;
use shardlink_core::ShardSpec;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const STATEMENT: &str = "INSERT INTO example (foo) VALUES ('bar')";

fn replicated_registry(replica_count: usize) -> (ShardRegistry, MemoryDriver) {
    let driver = MemoryDriver::new();
    let mut drivers = DriverRegistry::new();
    drivers.register(driver.clone()).expect("register memory driver");
    let registry = ShardRegistry::new(drivers);
    let replicas = (1 ..= replica_count)
        .map(|index| ReplicaSpec::new(format!("db1-r{index}"), "memory", format!("replica-{index}")))
        .collect();
    registry
        .register(ShardSpec::new("db1", "memory", "primary").with_replicas(replicas))
        .expect("register shard");
    (registry, driver)
}

fn execute(
    registry: &ShardRegistry,
    strategy: ReplicationStrategy,
) -> Result<(), ExecuteError> {
    ReplicationCoordinator::new(registry).execute(
        &ShardKey::new("db1"),
        strategy,
        STATEMENT,
        &[],
    )
}

// ============================================================================
// SECTION: Strategy All
// ============================================================================

#[test]
fn all_commits_shard_and_every_replica_on_success() {
    let (registry, driver) = replicated_registry(2);
    execute(&registry, ReplicationStrategy::All).expect("replicated execute");

    for dsn in ["primary", "replica-1", "replica-2"] {
        assert_eq!(driver.committed(dsn), vec![STATEMENT.to_string()], "dsn {dsn}");
        assert_eq!(driver.counters(dsn).commits, 1, "dsn {dsn}");
        assert_eq!(driver.counters(dsn).rollbacks, 0, "dsn {dsn}");
    }
}

#[test]
fn replica_failure_rolls_back_every_opened_transaction() {
    let (registry, driver) = replicated_registry(3);
    driver.script_exec_failure("replica-2", "disk full");

    let err = execute(&registry, ReplicationStrategy::All).expect_err("must fail");
    let ExecuteError::Composite(composite) = err else {
        panic!("expected composite error");
    };
    assert_eq!(composite.failures().len(), 1);
    assert_eq!(composite.failures()[0].key, ShardKey::new("db1-r2"));
    assert!(composite.to_string().contains("disk full"));

    // Shard and replicas 1..=2 opened transactions; all of them rolled back.
    for dsn in ["primary", "replica-1", "replica-2"] {
        assert_eq!(driver.counters(dsn).begins, 1, "dsn {dsn}");
        assert_eq!(driver.counters(dsn).rollbacks, 1, "dsn {dsn}");
        assert_eq!(driver.counters(dsn).commits, 0, "dsn {dsn}");
        assert!(driver.committed(dsn).is_empty(), "dsn {dsn}");
    }

    // The replica after the failing one is never begun.
    assert_eq!(driver.counters("replica-3").begins, 0);
    assert_eq!(driver.counters("replica-3").execs, 0);
}

#[test]
fn shard_failure_skips_the_replica_fanout() {
    let (registry, driver) = replicated_registry(2);
    driver.script_exec_failure("primary", "constraint violation");

    let err = execute(&registry, ReplicationStrategy::All).expect_err("must fail");
    let ExecuteError::Composite(composite) = err else {
        panic!("expected composite error");
    };
    assert_eq!(composite.failures()[0].key, ShardKey::new("db1"));

    assert_eq!(driver.counters("primary").rollbacks, 1);
    assert_eq!(driver.counters("replica-1").begins, 0);
    assert_eq!(driver.counters("replica-2").begins, 0);
}

#[test]
fn replica_connect_failure_is_a_replica_step_failure() {
    let (registry, driver) = replicated_registry(2);
    driver.script_open_failure("replica-1", "unreachable");

    let err = execute(&registry, ReplicationStrategy::All).expect_err("must fail");
    let ExecuteError::Composite(composite) = err else {
        panic!("expected composite error");
    };
    assert_eq!(composite.failures()[0].key, ShardKey::new("db1-r1"));
    assert!(composite.to_string().contains("unreachable"));

    assert_eq!(driver.counters("primary").rollbacks, 1);
    assert_eq!(driver.counters("replica-2").begins, 0);
}

#[test]
fn commit_failures_report_the_half_open_state() {
    let (registry, driver) = replicated_registry(1);
    driver.script_commit_failure("replica-1", "commit io error");

    let err = execute(&registry, ReplicationStrategy::All).expect_err("must fail");
    let ExecuteError::Composite(composite) = err else {
        panic!("expected composite error");
    };
    assert_eq!(composite.failures().len(), 1);
    assert_eq!(composite.failures()[0].key, ShardKey::new("db1-r1"));
    assert!(composite.to_string().contains("commit failed"));

    // The shard commit already succeeded; the half-open outcome is reported,
    // not retried.
    assert_eq!(driver.committed("primary"), vec![STATEMENT.to_string()]);
    assert!(driver.committed("replica-1").is_empty());
}

#[test]
fn rollback_failures_are_collected_alongside_the_cause() {
    let (registry, driver) = replicated_registry(1);
    driver.script_exec_failure("replica-1", "disk full");
    driver.script_rollback_failure("primary", "connection lost");

    let err = execute(&registry, ReplicationStrategy::All).expect_err("must fail");
    let ExecuteError::Composite(composite) = err else {
        panic!("expected composite error");
    };
    let rendered = composite.to_string();
    assert!(rendered.contains("disk full"));
    assert!(rendered.contains("rollback failed"));
    assert!(rendered.contains("connection lost"));
    assert_eq!(composite.failures().len(), 2);
}

// ============================================================================
// SECTION: Strategy None
// ============================================================================

#[test]
fn none_commits_the_shard_without_touching_replicas() {
    let (registry, driver) = replicated_registry(2);
    execute(&registry, ReplicationStrategy::None).expect("single execute");

    assert_eq!(driver.committed("primary"), vec![STATEMENT.to_string()]);
    assert_eq!(driver.counters("replica-1").begins, 0);
    assert_eq!(driver.counters("replica-2").begins, 0);
}

#[test]
fn none_rolls_back_on_exec_failure() {
    let (registry, driver) = replicated_registry(0);
    driver.script_exec_failure("primary", "syntax error");

    let err = execute(&registry, ReplicationStrategy::None).expect_err("must fail");
    let ExecuteError::Composite(composite) = err else {
        panic!("expected composite error");
    };
    assert!(composite.to_string().contains("syntax error"));
    assert_eq!(driver.counters("primary").rollbacks, 1);
    assert!(driver.committed("primary").is_empty());
}

#[test]
fn none_treats_an_auto_finalized_rollback_as_benign() {
    let (registry, driver) = replicated_registry(0);
    driver.script_auto_finalize("primary");
    driver.script_exec_failure("primary", "syntax error");

    let err = execute(&registry, ReplicationStrategy::None).expect_err("must fail");
    let ExecuteError::Composite(composite) = err else {
        panic!("expected composite error");
    };
    // Only the exec failure is reported; the already-finished rollback is not.
    assert_eq!(composite.failures().len(), 1);
    assert!(!composite.to_string().contains("rollback failed"));
}

// ============================================================================
// SECTION: Strategy Some and Resolution
// ============================================================================

#[test]
fn some_is_reserved_and_rejected() {
    let (registry, driver) = replicated_registry(1);
    let err = execute(&registry, ReplicationStrategy::Some).expect_err("must fail");
    assert!(matches!(err, ExecuteError::UnsupportedStrategy { .. }));
    assert_eq!(driver.counters("primary").begins, 0);
    assert_eq!(driver.counters("replica-1").begins, 0);
}

#[test]
fn unregistered_shard_fails_before_any_transaction() {
    let (registry, _driver) = replicated_registry(0);
    let err = ReplicationCoordinator::new(&registry)
        .execute(&ShardKey::new("missing"), ReplicationStrategy::All, STATEMENT, &[])
        .expect_err("must fail");
    assert!(matches!(
        err,
        ExecuteError::Registry(RegistryError::NotRegistered { .. })
    ));
}
