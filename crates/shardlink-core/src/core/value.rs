// crates/shardlink-core/src/core/value.rs
// ============================================================================
// Module: Shardlink Statement Values
// Description: Driver-agnostic statement argument values.
// Purpose: Carry bound statement arguments across the driver boundary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`SqlValue`] is the driver-agnostic rendering of a bound statement
//! argument. Drivers convert these values into their native parameter types
//! at the capability-interface boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Statement Values
// ============================================================================

/// Bound statement argument passed through the driver interface.
///
/// # Invariants
/// - Variants are stable for configuration and programmatic handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}
