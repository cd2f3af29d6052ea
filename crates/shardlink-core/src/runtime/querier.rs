// crates/shardlink-core/src/runtime/querier.rs
// ============================================================================
// Module: Shardlink Multi-Shard Querier
// Description: Transactional unit-of-work execution across selected shards.
// Purpose: Fan a caller-supplied unit of work out over shards sequentially.
// Dependencies: crate::{core, interfaces, runtime::{registry, replication}}, thiserror
// ============================================================================

//! ## Overview
//! A [`Selection`] is an ephemeral set of shards plus an aggregation policy,
//! built per logical multi-shard operation through
//! [`ShardRegistry::select`] or [`ShardRegistry::select_all`] and consumed by
//! one [`Selection::run`] call. Each selected shard runs the caller-supplied
//! unit of work inside its own transaction; the unit of work decides whether
//! that transaction commits or rolls back. Shards execute sequentially in
//! selection order so fail-fast short-circuiting can observe each outcome
//! before starting the next shard.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ShardKey;
use crate::core::ShardSpec;
use crate::interfaces::Transaction;
use crate::interfaces::rollback_benign;
use crate::runtime::registry::RegistryError;
use crate::runtime::registry::ShardRegistry;
use crate::runtime::replication::CompositeError;
use crate::runtime::replication::StepFailure;

// ============================================================================
// SECTION: Unit of Work
// ============================================================================

/// Error type surfaced by caller-supplied units of work.
pub type WorkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome a successful unit of work requests for its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDisposition {
    /// Commit the transaction.
    Commit,
    /// Roll the transaction back; a deliberate no-op, not an error.
    Rollback,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// One shard's failure cause within a querier run.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StepError {
    /// Resolving the shard's connection failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Beginning the shard transaction failed.
    #[error("failed to begin transaction: {0}")]
    Begin(String),
    /// Committing the shard transaction failed.
    #[error("failed to commit transaction: {0}")]
    Commit(String),
    /// Rolling back the shard transaction failed.
    #[error("failed to roll back transaction: {0}")]
    Rollback(String),
    /// The caller-supplied unit of work reported an error.
    #[error("unit of work failed: {0}")]
    Work(#[source] WorkError),
}

/// Multi-shard querier errors.
///
/// # Invariants
/// - `Shard` carries the single failure of a fail-fast run.
/// - `Composite` enumerates every per-shard failure of an aggregate run.
#[derive(Debug, Error)]
pub enum QuerierError {
    /// The first shard failure of a fail-fast run; later shards untouched.
    #[error("failed on shard [{key}]: {source}")]
    Shard {
        /// The failing shard key.
        key: ShardKey,
        /// The shard's failure cause.
        #[source]
        source: StepError,
    },
    /// Every per-shard failure of an aggregate run, in selection order.
    #[error(transparent)]
    Composite(CompositeError),
}

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Ephemeral set of shards plus an aggregation policy for one logical
/// multi-shard operation.
///
/// # Invariants
/// - Holds cloned descriptors only; never a live connection handle.
/// - Consumed by one [`Selection::run`] call; not reused across operations.
pub struct Selection<'a> {
    /// The registry supplying connections during the run.
    registry: &'a ShardRegistry,
    /// The selected shard descriptors, in selection order.
    shards: Vec<ShardSpec>,
    /// Abort at the first per-shard error instead of attempting all shards.
    fail_fast: bool,
}

impl<'a> Selection<'a> {
    /// Creates a selection over pre-filtered shard descriptors.
    pub(crate) const fn new(registry: &'a ShardRegistry, shards: Vec<ShardSpec>) -> Self {
        Self {
            registry,
            shards,
            fail_fast: false,
        }
    }

    /// Stops the run at the first shard with an error instead of attempting
    /// every shard.
    #[must_use]
    pub const fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Returns the selected shard descriptors, in selection order.
    #[must_use]
    pub fn shards(&self) -> &[ShardSpec] {
        &self.shards
    }

    /// Returns the number of selected shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Returns true when no shards were selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Runs the unit of work against each selected shard inside its own
    /// transaction, sequentially in selection order. An empty selection is a
    /// no-op success.
    ///
    /// The unit of work receives a read-only descriptor clone and the open
    /// transaction, and reports whether to commit or roll back. A rollback of
    /// a transaction the driver already finalized is treated as benign.
    ///
    /// # Errors
    ///
    /// With fail-fast enabled, returns [`QuerierError::Shard`] for the first
    /// failing shard, leaving later shards untouched. Otherwise every shard
    /// is attempted and [`QuerierError::Composite`] combines all per-shard
    /// failures, each attributed to its shard key.
    pub fn run<F>(self, mut work: F) -> Result<(), QuerierError>
    where
        F: FnMut(&ShardSpec, &mut dyn Transaction) -> Result<TxDisposition, WorkError>,
    {
        let mut failures: Vec<StepFailure> = Vec::new();
        for spec in &self.shards {
            if let Err(err) = run_shard(self.registry, spec, &mut work) {
                if self.fail_fast {
                    return Err(QuerierError::Shard {
                        key: spec.key.clone(),
                        source: err,
                    });
                }
                failures.push(StepFailure::new(spec.key.clone(), err.to_string()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(QuerierError::Composite(CompositeError::new(failures)))
        }
    }
}

/// Runs the unit of work for one shard inside its own transaction.
fn run_shard<F>(
    registry: &ShardRegistry,
    spec: &ShardSpec,
    work: &mut F,
) -> Result<(), StepError>
where
    F: FnMut(&ShardSpec, &mut dyn Transaction) -> Result<TxDisposition, WorkError>,
{
    let connection = registry.resolve(&spec.key)?;
    let mut transaction = connection.begin().map_err(|err| StepError::Begin(err.to_string()))?;
    match work(spec, transaction.as_mut()) {
        Err(work_err) => match rollback_benign(transaction) {
            Ok(()) => Err(StepError::Work(work_err)),
            Err(rollback_err) => Err(StepError::Rollback(format!(
                "unit of work failed: {work_err}; rollback also failed: {rollback_err}"
            ))),
        },
        Ok(TxDisposition::Rollback) => {
            rollback_benign(transaction).map_err(|err| StepError::Rollback(err.to_string()))
        }
        Ok(TxDisposition::Commit) => {
            transaction.commit().map_err(|err| StepError::Commit(err.to_string()))
        }
    }
}
