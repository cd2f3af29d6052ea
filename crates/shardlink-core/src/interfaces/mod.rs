// crates/shardlink-core/src/interfaces/mod.rs
// ============================================================================
// Module: Shardlink Driver Interfaces
// Description: Backend-agnostic capability interfaces for database drivers.
// Purpose: Define the contract surfaces the coordinator uses to reach databases.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Shardlink reaches relational databases without
//! embedding backend-specific details. A [`Driver`] opens [`Connection`]s
//! from a DSN; a connection begins [`Transaction`]s; a transaction executes
//! statements and is consumed by `commit` or `rollback`. Backends are
//! selected by name through a [`DriverRegistry`], so new backends are added
//! without touching the coordinator.
//!
//! A rollback of a transaction the driver has already finalized is a benign
//! outcome ([`DriverError::AlreadyFinished`]), not an error: some drivers
//! auto-finalize transactions (for example on DDL statements).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::DriverName;
use crate::core::SqlValue;

// ============================================================================
// SECTION: Driver Errors
// ============================================================================

/// Driver capability errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - [`DriverError::AlreadyFinished`] is benign on rollback paths.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Opening a connection failed.
    #[error("driver open error: {0}")]
    Open(String),
    /// Beginning a transaction failed.
    #[error("driver begin error: {0}")]
    Begin(String),
    /// Executing a statement failed.
    #[error("driver exec error: {0}")]
    Exec(String),
    /// Committing a transaction failed.
    #[error("driver commit error: {0}")]
    Commit(String),
    /// Rolling back a transaction failed.
    #[error("driver rollback error: {0}")]
    Rollback(String),
    /// Closing a connection failed.
    #[error("driver close error: {0}")]
    Close(String),
    /// The transaction was already finalized by the driver.
    #[error("transaction already finished")]
    AlreadyFinished,
}

// ============================================================================
// SECTION: Capability Traits
// ============================================================================

/// Database backend capable of opening connections from a DSN.
pub trait Driver: Send + Sync {
    /// Returns the stable driver name used for registry lookups.
    fn name(&self) -> &'static str;

    /// Opens a connection to the endpoint described by `dsn`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Open`] when the endpoint cannot be reached or
    /// the DSN is invalid.
    fn open(&self, dsn: &str) -> Result<Box<dyn Connection>, DriverError>;
}

/// Live connection to one database endpoint.
///
/// Connections may be used concurrently by multiple callers once
/// established; any internal serialization is the driver's concern.
pub trait Connection: Send + Sync {
    /// Begins a new transaction on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Begin`] when the transaction cannot be started.
    fn begin(&self) -> Result<Box<dyn Transaction>, DriverError>;

    /// Closes the connection. Further use of the connection is an error.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Close`] when teardown fails.
    fn close(&self) -> Result<(), DriverError>;
}

/// Open transaction consumed by `commit` or `rollback`.
pub trait Transaction: Send {
    /// Executes a statement with bound arguments, returning affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Exec`] when execution fails.
    fn exec(&mut self, statement: &str, args: &[SqlValue]) -> Result<u64, DriverError>;

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Commit`] on failure, or
    /// [`DriverError::AlreadyFinished`] when the driver already finalized the
    /// transaction.
    fn commit(self: Box<Self>) -> Result<(), DriverError>;

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Rollback`] on failure, or
    /// [`DriverError::AlreadyFinished`] when the driver already finalized the
    /// transaction.
    fn rollback(self: Box<Self>) -> Result<(), DriverError>;
}

/// Rolls a transaction back, treating an already-finalized transaction as
/// success.
///
/// # Errors
///
/// Returns [`DriverError::Rollback`] only for genuine rollback failures.
pub fn rollback_benign(transaction: Box<dyn Transaction>) -> Result<(), DriverError> {
    match transaction.rollback() {
        Ok(()) | Err(DriverError::AlreadyFinished) => Ok(()),
        Err(err) => Err(err),
    }
}

// ============================================================================
// SECTION: Driver Registry
// ============================================================================

/// Driver registry errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverRegistryError {
    /// A driver with the same name is already registered.
    #[error("driver already registered: {0}")]
    AlreadyRegistered(DriverName),
}

/// Name-to-implementation lookup for database drivers.
///
/// # Invariants
/// - Driver names are unique within the registry.
/// - Registered drivers are `Send + Sync` and stored behind trait objects.
#[derive(Default)]
pub struct DriverRegistry {
    /// Driver implementations keyed by driver name.
    drivers: BTreeMap<String, Box<dyn Driver>>,
}

impl DriverRegistry {
    /// Creates an empty driver registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    /// Registers a driver under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`DriverRegistryError::AlreadyRegistered`] when the name is
    /// taken.
    pub fn register(&mut self, driver: impl Driver + 'static) -> Result<(), DriverRegistryError> {
        let name = driver.name();
        if self.drivers.contains_key(name) {
            return Err(DriverRegistryError::AlreadyRegistered(DriverName::new(name)));
        }
        self.drivers.insert(name.to_string(), Box::new(driver));
        Ok(())
    }

    /// Returns the driver registered under `name`, when present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Driver> {
        self.drivers.get(name).map(|driver| driver.as_ref())
    }

    /// Returns the registered driver names in sorted order.
    #[must_use]
    pub fn driver_names(&self) -> Vec<DriverName> {
        self.drivers.keys().map(|name| DriverName::new(name.as_str())).collect()
    }
}
