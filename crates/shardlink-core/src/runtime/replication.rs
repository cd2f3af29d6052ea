// crates/shardlink-core/src/runtime/replication.rs
// ============================================================================
// Module: Shardlink Replication Coordinator
// Description: Synchronous replication commit protocol for shard writes.
// Purpose: Commit or roll back every transaction of one logical operation.
// Dependencies: crate::{core, interfaces, runtime::registry}, thiserror
// ============================================================================

//! ## Overview
//! The replication coordinator executes one statement transactionally against
//! a shard and, under [`ReplicationStrategy::All`], against each of its
//! replicas in registration order. Every opened transaction is kept pending
//! until the last attempted step's outcome is known, then one decision
//! commits all of them or rolls all of them back. A failure before the final
//! replica is therefore a cheap rollback, never a partial write. A true
//! distributed two-phase commit would need driver-level support that is not
//! assumed to exist; a half-open state after commit failures is reported but
//! not retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

use crate::core::ReplicationStrategy;
use crate::core::ShardKey;
use crate::core::SqlValue;
use crate::interfaces::Transaction;
use crate::interfaces::rollback_benign;
use crate::runtime::registry::RegistryError;
use crate::runtime::registry::ShardRegistry;

// ============================================================================
// SECTION: Composite Errors
// ============================================================================

/// One failed step of a multi-step operation, attributed to its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// The shard or replica key the step ran against.
    pub key: ShardKey,
    /// The step failure message.
    pub message: String,
}

impl StepFailure {
    /// Creates a new step failure.
    #[must_use]
    pub const fn new(key: ShardKey, message: String) -> Self {
        Self {
            key,
            message,
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.key, self.message)
    }
}

/// Aggregated failures from one logical operation.
///
/// # Invariants
/// - Failures keep attempt order and are never deduplicated; every
///   subordinate failure appears exactly once with its key attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeError {
    /// The collected step failures, in attempt order.
    failures: Vec<StepFailure>,
}

impl CompositeError {
    /// Creates a composite error from collected failures.
    #[must_use]
    pub const fn new(failures: Vec<StepFailure>) -> Self {
        Self {
            failures,
        }
    }

    /// Returns the collected failures in attempt order.
    #[must_use]
    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, failure) in self.failures.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            failure.fmt(f)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositeError {}

// ============================================================================
// SECTION: Coordinator Errors
// ============================================================================

/// Replication coordinator errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `Composite` enumerates every exec, commit, and rollback failure of the
///   operation; nothing is discarded.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Resolving the shard or its connection failed before any transaction
    /// was opened.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Beginning the shard transaction failed before any replica was
    /// attempted.
    #[error("failed to begin transaction on shard [{key}]: {message}")]
    Begin {
        /// The shard key.
        key: ShardKey,
        /// The driver begin failure.
        message: String,
    },
    /// The strategy is reserved and intentionally unimplemented.
    #[error("replication strategy [{strategy}] is reserved and not implemented")]
    UnsupportedStrategy {
        /// The rejected strategy.
        strategy: ReplicationStrategy,
    },
    /// One or more steps of the operation failed.
    #[error(transparent)]
    Composite(CompositeError),
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Executes single statements with synchronous replication semantics.
///
/// # Invariants
/// - Replica fan-out is sequential, in registration order, and stops at the
///   first replica failure; later replicas are never begun.
/// - Every transaction opened for one call is committed, or every one of
///   them is rolled back.
pub struct ReplicationCoordinator<'a> {
    /// The registry supplying shard topology and connections.
    registry: &'a ShardRegistry,
}

impl<'a> ReplicationCoordinator<'a> {
    /// Creates a coordinator over the given registry.
    #[must_use]
    pub const fn new(registry: &'a ShardRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Executes a statement against the shard and, per the strategy, its
    /// replicas, with commit-all-or-rollback-all semantics.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::Registry`] when the shard key cannot be
    /// resolved, [`ExecuteError::Begin`] when the shard transaction cannot be
    /// started, [`ExecuteError::UnsupportedStrategy`] for the reserved
    /// strategy, and [`ExecuteError::Composite`] for any failure after the
    /// shard transaction was opened.
    pub fn execute(
        &self,
        shard_key: &ShardKey,
        strategy: ReplicationStrategy,
        statement: &str,
        args: &[SqlValue],
    ) -> Result<(), ExecuteError> {
        match strategy {
            ReplicationStrategy::None => self.execute_single(shard_key, statement, args),
            ReplicationStrategy::All => self.execute_replicated(shard_key, statement, args),
            ReplicationStrategy::Some => Err(ExecuteError::UnsupportedStrategy {
                strategy,
            }),
        }
    }

    /// Executes the statement on the shard only, with its own
    /// begin/exec/commit-or-rollback envelope.
    fn execute_single(
        &self,
        shard_key: &ShardKey,
        statement: &str,
        args: &[SqlValue],
    ) -> Result<(), ExecuteError> {
        let spec = self.registry.shard(shard_key)?;
        let connection = self.registry.resolve(&spec.key)?;
        let mut transaction = connection.begin().map_err(|err| ExecuteError::Begin {
            key: spec.key.clone(),
            message: err.to_string(),
        })?;
        if let Err(exec_err) = transaction.exec(statement, args) {
            let mut failures =
                vec![StepFailure::new(spec.key.clone(), format!("exec failed: {exec_err}"))];
            if let Err(rollback_err) = rollback_benign(transaction) {
                failures
                    .push(StepFailure::new(spec.key, format!("rollback failed: {rollback_err}")));
            }
            return Err(ExecuteError::Composite(CompositeError::new(failures)));
        }
        transaction.commit().map_err(|err| {
            ExecuteError::Composite(CompositeError::new(vec![StepFailure::new(
                spec.key,
                format!("commit failed: {err}"),
            )]))
        })
    }

    /// Executes the statement on the shard and every replica, committing all
    /// opened transactions only when every attempted step succeeded.
    fn execute_replicated(
        &self,
        shard_key: &ShardKey,
        statement: &str,
        args: &[SqlValue],
    ) -> Result<(), ExecuteError> {
        let spec = self.registry.shard(shard_key)?;
        let connection = self.registry.resolve(&spec.key)?;
        let mut shard_transaction = connection.begin().map_err(|err| ExecuteError::Begin {
            key: spec.key.clone(),
            message: err.to_string(),
        })?;

        let mut transactions: Vec<(ShardKey, Box<dyn Transaction>)> = Vec::new();
        let mut failures: Vec<StepFailure> = Vec::new();

        let shard_result = shard_transaction.exec(statement, args);
        transactions.push((spec.key.clone(), shard_transaction));
        if let Err(err) = shard_result {
            failures.push(StepFailure::new(spec.key.clone(), format!("exec failed: {err}")));
        }

        if failures.is_empty() {
            for replica in &spec.replicas {
                let replica_connection = match self.registry.resolve(&replica.key) {
                    Ok(replica_connection) => replica_connection,
                    Err(err) => {
                        failures.push(StepFailure::new(replica.key.clone(), err.to_string()));
                        break;
                    }
                };
                let mut replica_transaction = match replica_connection.begin() {
                    Ok(replica_transaction) => replica_transaction,
                    Err(err) => {
                        failures.push(StepFailure::new(
                            replica.key.clone(),
                            format!("begin failed: {err}"),
                        ));
                        break;
                    }
                };
                let replica_result = replica_transaction.exec(statement, args);
                transactions.push((replica.key.clone(), replica_transaction));
                if let Err(err) = replica_result {
                    failures
                        .push(StepFailure::new(replica.key.clone(), format!("exec failed: {err}")));
                    break;
                }
            }
        }

        if failures.is_empty() {
            for (key, transaction) in transactions {
                if let Err(err) = transaction.commit() {
                    failures.push(StepFailure::new(key, format!("commit failed: {err}")));
                }
            }
        } else {
            for (key, transaction) in transactions {
                if let Err(err) = rollback_benign(transaction) {
                    failures.push(StepFailure::new(key, format!("rollback failed: {err}")));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExecuteError::Composite(CompositeError::new(failures)))
        }
    }
}
