// crates/shardlink-core/src/runtime/stats.rs
// ============================================================================
// Module: Shardlink Registry Stats
// Description: Dependency-light operation counters for the shard registry.
// Purpose: Provide metric counters without a logging-framework dependency.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics surface for registry operations. It is
//! intentionally dependency-light so downstream deployments can plug the
//! snapshot into Prometheus or OpenTelemetry without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Internal mutable registry counters before snapshot serialization.
#[derive(Debug, Default)]
pub(crate) struct RegistryStats {
    /// Entries installed (first registration or replacement).
    registrations: AtomicU64,
    /// Entries that replaced an existing key.
    replacements: AtomicU64,
    /// Connection handle resolutions (cache hits included).
    resolves: AtomicU64,
    /// Connections established lazily.
    connections_opened: AtomicU64,
    /// Failed connection establishment attempts.
    connect_failures: AtomicU64,
    /// Connections closed.
    connections_closed: AtomicU64,
    /// Failed connection close attempts.
    close_failures: AtomicU64,
}

impl RegistryStats {
    /// Records an entry installation.
    pub(crate) fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an entry replacement.
    pub(crate) fn record_replacement(&self) {
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection resolution.
    pub(crate) fn record_resolve(&self) {
        self.resolves.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successfully established connection.
    pub(crate) fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed connection establishment.
    pub(crate) fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a closed connection.
    pub(crate) fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed connection close.
    pub(crate) fn record_close_failure(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a serializable snapshot of the counters.
    pub(crate) fn snapshot(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            resolves: self.resolves.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of registry operation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatsSnapshot {
    /// Entries installed (first registration or replacement).
    pub registrations: u64,
    /// Entries that replaced an existing key.
    pub replacements: u64,
    /// Connection handle resolutions (cache hits included).
    pub resolves: u64,
    /// Connections established lazily.
    pub connections_opened: u64,
    /// Failed connection establishment attempts.
    pub connect_failures: u64,
    /// Connections closed.
    pub connections_closed: u64,
    /// Failed connection close attempts.
    pub close_failures: u64,
}
