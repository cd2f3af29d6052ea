// crates/shardlink-core/src/core/topology.rs
// ============================================================================
// Module: Shardlink Topology
// Description: Shard and replica descriptors plus replication strategies.
// Purpose: Provide pure value objects describing a sharded topology.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Topology types describe shards and their synchronous replicas as pure
//! values. A descriptor never carries a live connection handle: the registry
//! is the sole owner of handles, and callers only ever see cloned
//! descriptors. Replicas live in the same flat key namespace as shards to
//! avoid unbounded nesting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DriverName;
use crate::core::identifiers::ShardKey;

// ============================================================================
// SECTION: Replication Strategy
// ============================================================================

/// Policy governing whether replica writes must succeed for a shard write to
/// be considered committed.
///
/// # Invariants
/// - Variants are stable for configuration and programmatic handling.
/// - [`ReplicationStrategy::Some`] is reserved: the coordinator rejects it
///   rather than inferring a quorum policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationStrategy {
    /// Disable shard data replication.
    #[default]
    None,
    /// Replicate to every shard replica synchronously on every statement;
    /// every replica transaction must succeed for the operation to commit.
    All,
    /// Reserved: at least one replica transaction must succeed. Not
    /// implemented; callers must not assume behavior.
    Some,
}

impl ReplicationStrategy {
    /// Returns the stable configuration label for the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::All => "all",
            Self::Some => "some",
        }
    }
}

impl fmt::Display for ReplicationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Secondary endpoint written synchronously alongside its shard under the
/// [`ReplicationStrategy::All`] strategy.
///
/// # Invariants
/// - `key` is unique within the registry's flat shard+replica namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSpec {
    /// The replica unique key.
    pub key: ShardKey,
    /// The replica database driver name.
    pub driver: DriverName,
    /// The replica database connection string.
    pub dsn: String,
}

impl ReplicaSpec {
    /// Creates a new replica descriptor.
    #[must_use]
    pub fn new(
        key: impl Into<ShardKey>,
        driver: impl Into<DriverName>,
        dsn: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            driver: driver.into(),
            dsn: dsn.into(),
        }
    }
}

/// One independently addressable database endpoint identified by a unique
/// key, optionally with synchronous replicas.
///
/// # Invariants
/// - `key` and every replica key are unique within the registry's flat
///   namespace.
/// - Replica order is preserved: the coordinator fans out in this order.
/// - The descriptor never exposes a live connection handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSpec {
    /// The shard unique key.
    pub key: ShardKey,
    /// The shard database driver name.
    pub driver: DriverName,
    /// The shard database connection string.
    pub dsn: String,
    /// Ordered replica descriptors written under replication.
    #[serde(default)]
    pub replicas: Vec<ReplicaSpec>,
}

impl ShardSpec {
    /// Creates a new shard descriptor without replicas.
    #[must_use]
    pub fn new(
        key: impl Into<ShardKey>,
        driver: impl Into<DriverName>,
        dsn: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            driver: driver.into(),
            dsn: dsn.into(),
            replicas: Vec::new(),
        }
    }

    /// Returns the descriptor with the given replicas attached.
    #[must_use]
    pub fn with_replicas(mut self, replicas: Vec<ReplicaSpec>) -> Self {
        self.replicas = replicas;
        self
    }
}
