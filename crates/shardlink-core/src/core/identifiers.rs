// crates/shardlink-core/src/core/identifiers.rs
// ============================================================================
// Module: Shardlink Identifiers
// Description: Canonical opaque identifiers for shards and drivers.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the identifiers used throughout Shardlink. Identifiers
//! are opaque UTF-8 strings and serialize transparently on the wire. Shard
//! keys are unique within a registry's flat namespace: shards and replicas
//! share one lookup space, so a replica key must not collide with any shard
//! key or other replica key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Shard or replica key within a registry's flat namespace.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
/// - Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardKey(String);

impl ShardKey {
    /// Creates a new shard key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ShardKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ShardKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Name of a registered database driver.
///
/// # Invariants
/// - Opaque UTF-8 string; resolution happens against a [`crate::interfaces::DriverRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverName(String);

impl DriverName {
    /// Creates a new driver name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriverName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DriverName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DriverName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
