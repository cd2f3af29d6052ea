// crates/shardlink-driver-sqlite/src/lib.rs
// ============================================================================
// Module: Shardlink SQLite Driver Library
// Description: SQLite implementation of the driver capability interface.
// Purpose: Let shards and replicas address SQLite database files.
// Dependencies: shardlink-core, rusqlite, serde
// ============================================================================

//! ## Overview
//! This crate implements the Shardlink driver capability interface over
//! `SQLite`. Each DSN names a database file (or `:memory:`); connections are
//! opened with configurable journal/sync pragmas and a busy timeout, and
//! transaction control is issued through explicit `BEGIN IMMEDIATE`,
//! `COMMIT`, and `ROLLBACK` statements so transactions can cross the
//! trait-object boundary.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod driver;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use driver::SqliteDriver;
pub use driver::SqliteDriverConfig;
pub use driver::SqliteJournalMode;
pub use driver::SqliteSyncMode;
