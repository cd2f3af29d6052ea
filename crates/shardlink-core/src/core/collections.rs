// crates/shardlink-core/src/core/collections.rs
// ============================================================================
// Module: Shardlink Concurrent Map
// Description: Generic reader/writer-locked map with copy-out iteration.
// Purpose: Back the shard registry with a thread-safe key/value store.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`ConcurrentMap`] is a generic, lock-guarded map safe for arbitrary
//! concurrent callers. Readers proceed concurrently under a shared lock;
//! writers are exclusive. Iteration helpers copy entries out so the lock is
//! never held during caller-supplied iteration logic and iteration never
//! observes a concurrent mutation. Lock poisoning is absorbed: a panicked
//! writer does not wedge the map.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::PoisonError;
use std::sync::RwLock;

// ============================================================================
// SECTION: Concurrent Map
// ============================================================================

/// Thread-safe map with reader/writer lock discipline.
///
/// # Invariants
/// - `keys`/`values`/`snapshot` return independent copies, not views.
/// - No ordering guarantee on iteration helpers.
/// - Deleting a missing key is a silent no-op.
#[derive(Debug, Default)]
pub struct ConcurrentMap<K, V> {
    /// Underlying storage guarded by a reader/writer lock.
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Upserts a key/value pair.
    pub fn set(&self, key: K, value: V) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).insert(key, value);
    }

    /// Returns a clone of the value for the key, when present.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    /// Deletes the entry for the key, when present.
    pub fn delete(&self, key: &K) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).remove(key);
    }

    /// Returns a copy of the current keys.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    /// Returns a copy of the current values.
    #[must_use]
    pub fn values(&self) -> Vec<V> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    /// Returns an independent copy of the current entries.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Clone for ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: RwLock::new(self.snapshot()),
        }
    }
}
