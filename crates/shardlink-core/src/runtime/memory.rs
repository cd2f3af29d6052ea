// crates/shardlink-core/src/runtime/memory.rs
// ============================================================================
// Module: Shardlink In-Memory Driver
// Description: Simple in-memory driver for tests and examples.
// Purpose: Provide a deterministic driver implementation without external deps.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of the driver
//! capability interfaces for tests and local demos. Each DSN names an
//! independent database that records operation counters and the statements
//! committed to it; transactions buffer statements until commit. Failures can
//! be scripted per DSN to exercise error paths. It is not intended for
//! production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::SqlValue;
use crate::interfaces::Connection;
use crate::interfaces::Driver;
use crate::interfaces::DriverError;
use crate::interfaces::Transaction;

// ============================================================================
// SECTION: Database State
// ============================================================================

/// Operation counters recorded per in-memory database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    /// Successful connection opens.
    pub opens: u64,
    /// Transactions begun.
    pub begins: u64,
    /// Statement executions attempted.
    pub execs: u64,
    /// Commits attempted.
    pub commits: u64,
    /// Rollbacks attempted.
    pub rollbacks: u64,
    /// Successful connection closes.
    pub closes: u64,
}

/// One in-memory database keyed by DSN.
#[derive(Debug, Default)]
struct MemoryDatabase {
    /// Statements applied by committed transactions, in commit order.
    committed: Vec<String>,
    /// Operation counters.
    counters: MemoryCounters,
    /// Scripted open failure message.
    fail_open: Option<String>,
    /// Scripted begin failure message.
    fail_begin: Option<String>,
    /// Scripted exec failure message.
    fail_exec: Option<String>,
    /// Scripted commit failure message.
    fail_commit: Option<String>,
    /// Scripted rollback failure message.
    fail_rollback: Option<String>,
    /// Scripted close failure message.
    fail_close: Option<String>,
    /// Apply statements at exec time and report commit/rollback as already
    /// finished, imitating drivers that auto-finalize transactions.
    auto_finalize: bool,
}

/// Shared database table keyed by DSN.
type SharedDatabases = Arc<Mutex<BTreeMap<String, MemoryDatabase>>>;

/// Runs a closure against the database for `dsn`, creating it when absent.
fn with_database<T>(
    databases: &SharedDatabases,
    dsn: &str,
    f: impl FnOnce(&mut MemoryDatabase) -> T,
) -> T {
    let mut guard = databases.lock().unwrap_or_else(PoisonError::into_inner);
    f(guard.entry(dsn.to_string()).or_default())
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// In-memory driver for tests and examples.
///
/// Clones share the same database table, so a test can keep a handle for
/// inspection while the registry owns the registered instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    /// Databases keyed by DSN, shared across clones.
    databases: SharedDatabases,
}

impl MemoryDriver {
    /// Creates a driver with an empty database table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts every subsequent open on `dsn` to fail with `message`.
    pub fn script_open_failure(&self, dsn: &str, message: impl Into<String>) {
        let message = message.into();
        with_database(&self.databases, dsn, |db| db.fail_open = Some(message));
    }

    /// Scripts every subsequent begin on `dsn` to fail with `message`.
    pub fn script_begin_failure(&self, dsn: &str, message: impl Into<String>) {
        let message = message.into();
        with_database(&self.databases, dsn, |db| db.fail_begin = Some(message));
    }

    /// Scripts every subsequent exec on `dsn` to fail with `message`.
    pub fn script_exec_failure(&self, dsn: &str, message: impl Into<String>) {
        let message = message.into();
        with_database(&self.databases, dsn, |db| db.fail_exec = Some(message));
    }

    /// Scripts every subsequent commit on `dsn` to fail with `message`.
    pub fn script_commit_failure(&self, dsn: &str, message: impl Into<String>) {
        let message = message.into();
        with_database(&self.databases, dsn, |db| db.fail_commit = Some(message));
    }

    /// Scripts every subsequent rollback on `dsn` to fail with `message`.
    pub fn script_rollback_failure(&self, dsn: &str, message: impl Into<String>) {
        let message = message.into();
        with_database(&self.databases, dsn, |db| db.fail_rollback = Some(message));
    }

    /// Scripts every subsequent close on `dsn` to fail with `message`.
    pub fn script_close_failure(&self, dsn: &str, message: impl Into<String>) {
        let message = message.into();
        with_database(&self.databases, dsn, |db| db.fail_close = Some(message));
    }

    /// Makes `dsn` apply statements at exec time and report commit/rollback
    /// as already finished, imitating auto-finalizing drivers.
    pub fn script_auto_finalize(&self, dsn: &str) {
        with_database(&self.databases, dsn, |db| db.auto_finalize = true);
    }

    /// Returns the operation counters recorded for `dsn`.
    #[must_use]
    pub fn counters(&self, dsn: &str) -> MemoryCounters {
        with_database(&self.databases, dsn, |db| db.counters)
    }

    /// Returns the statements committed to `dsn`, in commit order.
    #[must_use]
    pub fn committed(&self, dsn: &str) -> Vec<String> {
        with_database(&self.databases, dsn, |db| db.committed.clone())
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self, dsn: &str) -> Result<Box<dyn Connection>, DriverError> {
        with_database(&self.databases, dsn, |db| {
            if let Some(message) = &db.fail_open {
                return Err(DriverError::Open(message.clone()));
            }
            db.counters.opens += 1;
            Ok(())
        })?;
        Ok(Box::new(MemoryConnection {
            databases: Arc::clone(&self.databases),
            dsn: dsn.to_string(),
        }))
    }
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Connection to one in-memory database.
struct MemoryConnection {
    /// Shared database table.
    databases: SharedDatabases,
    /// The database this connection addresses.
    dsn: String,
}

impl Connection for MemoryConnection {
    fn begin(&self) -> Result<Box<dyn Transaction>, DriverError> {
        with_database(&self.databases, &self.dsn, |db| {
            if let Some(message) = &db.fail_begin {
                return Err(DriverError::Begin(message.clone()));
            }
            db.counters.begins += 1;
            Ok(())
        })?;
        Ok(Box::new(MemoryTransaction {
            databases: Arc::clone(&self.databases),
            dsn: self.dsn.clone(),
            pending: Vec::new(),
        }))
    }

    fn close(&self) -> Result<(), DriverError> {
        with_database(&self.databases, &self.dsn, |db| {
            if let Some(message) = &db.fail_close {
                return Err(DriverError::Close(message.clone()));
            }
            db.counters.closes += 1;
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: Transaction
// ============================================================================

/// Transaction buffering statements until commit.
struct MemoryTransaction {
    /// Shared database table.
    databases: SharedDatabases,
    /// The database this transaction addresses.
    dsn: String,
    /// Statements executed but not yet committed.
    pending: Vec<String>,
}

impl Transaction for MemoryTransaction {
    fn exec(&mut self, statement: &str, _args: &[SqlValue]) -> Result<u64, DriverError> {
        let auto_finalize = with_database(&self.databases, &self.dsn, |db| {
            db.counters.execs += 1;
            if let Some(message) = &db.fail_exec {
                return Err(DriverError::Exec(message.clone()));
            }
            if db.auto_finalize {
                db.committed.push(statement.to_string());
            }
            Ok(db.auto_finalize)
        })?;
        if !auto_finalize {
            self.pending.push(statement.to_string());
        }
        Ok(1)
    }

    fn commit(self: Box<Self>) -> Result<(), DriverError> {
        let pending = self.pending;
        with_database(&self.databases, &self.dsn, |db| {
            db.counters.commits += 1;
            if db.auto_finalize {
                return Err(DriverError::AlreadyFinished);
            }
            if let Some(message) = &db.fail_commit {
                return Err(DriverError::Commit(message.clone()));
            }
            db.committed.extend(pending);
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        with_database(&self.databases, &self.dsn, |db| {
            db.counters.rollbacks += 1;
            if db.auto_finalize {
                return Err(DriverError::AlreadyFinished);
            }
            if let Some(message) = &db.fail_rollback {
                return Err(DriverError::Rollback(message.clone()));
            }
            Ok(())
        })
    }
}
