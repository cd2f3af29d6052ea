// crates/shardlink-core/src/runtime/registry.rs
// ============================================================================
// Module: Shardlink Shard Registry
// Description: Thread-safe shard registry with lazy connection lifecycle.
// Purpose: Own every live connection handle and serialize entry mutation.
// Dependencies: crate::{core, interfaces}, thiserror
// ============================================================================

//! ## Overview
//! The shard registry maps shard and replica keys to registered endpoints in
//! one flat namespace and owns their live connection handles. Connections are
//! established lazily, exactly once per entry, with the establishment error
//! cached so an unreachable endpoint is not retried on every caller.
//! Re-registering a key closes the prior live connection before the entry is
//! replaced; a close failure aborts the registration and leaves the old entry
//! in place. The registry is an explicit instance threaded through the
//! coordinator and querier; there is no process-wide global.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::OnceLock;

use thiserror::Error;

use crate::core::ConcurrentMap;
use crate::core::DriverName;
use crate::core::ReplicaSpec;
use crate::core::ShardKey;
use crate::core::ShardSpec;
use crate::interfaces::Connection;
use crate::interfaces::DriverRegistry;
use crate::runtime::querier::Selection;
use crate::runtime::stats::RegistryStats;
use crate::runtime::stats::RegistryStatsSnapshot;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Shard registry errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `Connect` outcomes are cached per entry until the key is re-registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No entry exists for the key.
    #[error("shard [{key}] is not registered")]
    NotRegistered {
        /// The unresolved key.
        key: ShardKey,
    },
    /// The entry names a driver that is not registered.
    #[error("driver [{driver}] for shard [{key}] is not registered")]
    DriverMissing {
        /// The entry key.
        key: ShardKey,
        /// The missing driver name.
        driver: DriverName,
    },
    /// Lazily establishing the connection failed.
    #[error("failed to open a database connection for shard [{key}]: {message}")]
    Connect {
        /// The entry key.
        key: ShardKey,
        /// The driver open failure.
        message: String,
    },
    /// Closing the prior connection during re-registration failed; the new
    /// entry was not installed.
    #[error("failed to close the previous connection for shard [{key}]: {message}")]
    ReplaceClose {
        /// The entry key.
        key: ShardKey,
        /// The driver close failure.
        message: String,
    },
    /// Closing the entry's connection failed; the entry was still removed.
    #[error("failed to close the connection for shard [{key}]: {message}")]
    Close {
        /// The entry key.
        key: ShardKey,
        /// The driver close failure.
        message: String,
    },
}

// ============================================================================
// SECTION: Registry Entries
// ============================================================================

/// Role of an entry within the flat registry namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointRole {
    /// Primary endpoint addressable by the coordinator and querier.
    Shard,
    /// Secondary endpoint written only through its shard's replica chain.
    Replica,
}

/// One registered endpoint and its lazily-established connection slot.
///
/// # Invariants
/// - `connection` is initialized at most once; the cached value is either the
///   shared handle or the establishment error.
/// - `replicas` is non-empty only for [`EndpointRole::Shard`] entries.
struct ShardEntry {
    /// The entry key.
    key: ShardKey,
    /// The entry driver name.
    driver: DriverName,
    /// The entry connection string.
    dsn: String,
    /// Shard or replica role.
    role: EndpointRole,
    /// Ordered replica descriptors (shard entries only).
    replicas: Vec<ReplicaSpec>,
    /// Lazily-established connection handle or cached establishment error.
    connection: OnceLock<Result<Arc<dyn Connection>, RegistryError>>,
}

impl ShardEntry {
    /// Returns the public descriptor for the entry, without the handle.
    fn to_spec(&self) -> ShardSpec {
        ShardSpec {
            key: self.key.clone(),
            driver: self.driver.clone(),
            dsn: self.dsn.clone(),
            replicas: self.replicas.clone(),
        }
    }
}

// ============================================================================
// SECTION: Shard Registry
// ============================================================================

/// Thread-safe registry of shards, replicas, and their live connections.
///
/// # Invariants
/// - Shard and replica keys are unique within the flat namespace.
/// - The registry is the sole owner of connection handles; callers only ever
///   see cloned descriptors.
/// - A live connection is established at most once per entry, even under
///   concurrent first use.
pub struct ShardRegistry {
    /// Driver implementations available to entries.
    drivers: DriverRegistry,
    /// Registered entries keyed by shard or replica key.
    entries: ConcurrentMap<ShardKey, Arc<ShardEntry>>,
    /// Operation counters.
    stats: RegistryStats,
}

impl ShardRegistry {
    /// Creates a registry backed by the given driver registry.
    #[must_use]
    pub fn new(drivers: DriverRegistry) -> Self {
        Self {
            drivers,
            entries: ConcurrentMap::new(),
            stats: RegistryStats::default(),
        }
    }

    /// Returns the driver registry backing this shard registry.
    #[must_use]
    pub const fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Registers a shard and its replicas in the flat namespace.
    ///
    /// The connection is opened lazily on first [`ShardRegistry::resolve`].
    /// For each key that already exists with a live connection, the old
    /// connection is closed before the entry is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ReplaceClose`] when a prior connection cannot
    /// be closed; the entry for that key keeps its previous value.
    pub fn register(&self, spec: ShardSpec) -> Result<(), RegistryError> {
        self.install(
            spec.key.clone(),
            spec.driver.clone(),
            spec.dsn.clone(),
            EndpointRole::Shard,
            spec.replicas.clone(),
        )?;
        for replica in spec.replicas {
            self.install(
                replica.key,
                replica.driver,
                replica.dsn,
                EndpointRole::Replica,
                Vec::new(),
            )?;
        }
        Ok(())
    }

    /// Registers a sequence of shards, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] encountered; earlier shards in the
    /// sequence remain registered.
    pub fn register_all(
        &self,
        specs: impl IntoIterator<Item = ShardSpec>,
    ) -> Result<(), RegistryError> {
        for spec in specs {
            self.register(spec)?;
        }
        Ok(())
    }

    /// Returns the live connection for a key, establishing it lazily and
    /// exactly once. Concurrent first callers block until the in-flight
    /// attempt resolves, then observe the same handle or the same cached
    /// establishment error.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] for unknown keys,
    /// [`RegistryError::DriverMissing`] when the entry's driver is not
    /// registered, and [`RegistryError::Connect`] (cached) when opening
    /// failed.
    pub fn resolve(&self, key: &ShardKey) -> Result<Arc<dyn Connection>, RegistryError> {
        let Some(entry) = self.entries.get(key) else {
            return Err(RegistryError::NotRegistered {
                key: key.clone(),
            });
        };
        self.stats.record_resolve();
        entry.connection.get_or_init(|| self.establish(&entry)).clone()
    }

    /// Closes the entry for a key and removes it from the registry. The
    /// entry is removed even when the close fails; a missing key is a silent
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Close`] when the live connection's teardown
    /// fails.
    pub fn close(&self, key: &ShardKey) -> Result<(), RegistryError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(());
        };
        self.entries.delete(key);
        if let Some(Ok(connection)) = entry.connection.get() {
            if let Err(err) = connection.close() {
                self.stats.record_close_failure();
                return Err(RegistryError::Close {
                    key: key.clone(),
                    message: err.to_string(),
                });
            }
            self.stats.record_connection_closed();
        }
        Ok(())
    }

    /// Closes every registered connection and removes every entry,
    /// collecting close failures instead of stopping at the first one.
    pub fn close_all(&self) -> Vec<RegistryError> {
        let mut errors = Vec::new();
        for key in self.entries.keys() {
            if let Err(err) = self.close(&key) {
                errors.push(err);
            }
        }
        errors
    }

    /// Returns descriptors for every registered shard (replicas are reachable
    /// through their shard's descriptor). No ordering guarantee.
    #[must_use]
    pub fn lookup(&self) -> Vec<ShardSpec> {
        self.entries
            .values()
            .into_iter()
            .filter(|entry| entry.role == EndpointRole::Shard)
            .map(|entry| entry.to_spec())
            .collect()
    }

    /// Returns every registered shard key. No ordering guarantee.
    #[must_use]
    pub fn shard_keys(&self) -> Vec<ShardKey> {
        self.entries
            .values()
            .into_iter()
            .filter(|entry| entry.role == EndpointRole::Shard)
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Returns the descriptor for a registered shard.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] when the key is unknown or
    /// names a replica entry.
    pub fn shard(&self, key: &ShardKey) -> Result<ShardSpec, RegistryError> {
        match self.entries.get(key) {
            Some(entry) if entry.role == EndpointRole::Shard => Ok(entry.to_spec()),
            _ => Err(RegistryError::NotRegistered {
                key: key.clone(),
            }),
        }
    }

    /// Builds a selection over the registered shards matching `keys`, in the
    /// given order. Unregistered keys and keys naming replica entries are
    /// silently skipped.
    #[must_use]
    pub fn select(&self, keys: &[ShardKey]) -> Selection<'_> {
        let mut shards = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.entries.get(key)
                && entry.role == EndpointRole::Shard
            {
                shards.push(entry.to_spec());
            }
        }
        Selection::new(self, shards)
    }

    /// Builds a selection over every registered shard.
    #[must_use]
    pub fn select_all(&self) -> Selection<'_> {
        Selection::new(self, self.lookup())
    }

    /// Returns a snapshot of the registry operation counters.
    #[must_use]
    pub fn stats_snapshot(&self) -> RegistryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Installs one entry, closing a prior live connection first.
    fn install(
        &self,
        key: ShardKey,
        driver: DriverName,
        dsn: String,
        role: EndpointRole,
        replicas: Vec<ReplicaSpec>,
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.entries.get(&key) {
            if let Some(Ok(connection)) = existing.connection.get() {
                if let Err(err) = connection.close() {
                    self.stats.record_close_failure();
                    return Err(RegistryError::ReplaceClose {
                        key,
                        message: err.to_string(),
                    });
                }
                self.stats.record_connection_closed();
            }
            self.stats.record_replacement();
        }
        self.entries.set(
            key.clone(),
            Arc::new(ShardEntry {
                key,
                driver,
                dsn,
                role,
                replicas,
                connection: OnceLock::new(),
            }),
        );
        self.stats.record_registration();
        Ok(())
    }

    /// Opens the entry's connection through its registered driver.
    fn establish(&self, entry: &ShardEntry) -> Result<Arc<dyn Connection>, RegistryError> {
        let Some(driver) = self.drivers.get(entry.driver.as_str()) else {
            self.stats.record_connect_failure();
            return Err(RegistryError::DriverMissing {
                key: entry.key.clone(),
                driver: entry.driver.clone(),
            });
        };
        match driver.open(&entry.dsn) {
            Ok(connection) => {
                self.stats.record_connection_opened();
                Ok(Arc::from(connection))
            }
            Err(err) => {
                self.stats.record_connect_failure();
                Err(RegistryError::Connect {
                    key: entry.key.clone(),
                    message: err.to_string(),
                })
            }
        }
    }
}
