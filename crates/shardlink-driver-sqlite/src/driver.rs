// crates/shardlink-driver-sqlite/src/driver.rs
// ============================================================================
// Module: SQLite Driver
// Description: SQLite-backed connections and transactions for Shardlink.
// Purpose: Implement Driver/Connection/Transaction over rusqlite.
// Dependencies: shardlink-core, rusqlite, serde
// ============================================================================

//! ## Overview
//! [`SqliteDriver`] opens one `rusqlite` connection per DSN and serializes
//! access to it through a mutex. Transactions are driven with explicit
//! `BEGIN IMMEDIATE`/`COMMIT`/`ROLLBACK` statements; one transaction runs at
//! a time per connection, and callers serialize transactional work per shard.
//! A `COMMIT` or `ROLLBACK` against a transaction `SQLite` already finalized
//! reports the benign already-finished outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use rusqlite::OpenFlags;
use rusqlite::params_from_iter;
use serde::Deserialize;
use shardlink_core::Connection;
use shardlink_core::Driver;
use shardlink_core::DriverError;
use shardlink_core::SqlValue;
use shardlink_core::Transaction;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// DSN addressing a private in-memory database.
const MEMORY_DSN: &str = ":memory:";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` driver.
///
/// # Invariants
/// - DSNs resolve to file paths (not directories) or `:memory:`.
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteDriverConfig {
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for SqliteDriverConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// `SQLite` implementation of the driver capability interface.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    /// Driver configuration applied to every opened connection.
    config: SqliteDriverConfig,
}

impl SqliteDriver {
    /// Creates a driver with the given configuration.
    #[must_use]
    pub const fn new(config: SqliteDriverConfig) -> Self {
        Self {
            config,
        }
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open(&self, dsn: &str) -> Result<Box<dyn Connection>, DriverError> {
        let connection = if dsn == MEMORY_DSN {
            rusqlite::Connection::open_in_memory()
                .map_err(|err| DriverError::Open(err.to_string()))?
        } else {
            let path = PathBuf::from(dsn);
            validate_database_path(&path)?;
            ensure_parent_dir(&path)?;
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
            rusqlite::Connection::open_with_flags(&path, flags)
                .map_err(|err| DriverError::Open(err.to_string()))?
        };
        apply_pragmas(&connection, &self.config)?;
        Ok(Box::new(SqliteConnection {
            inner: Arc::new(Mutex::new(Some(connection))),
        }))
    }
}

/// Validates a database file path before opening it.
fn validate_database_path(path: &Path) -> Result<(), DriverError> {
    if path.as_os_str().is_empty() {
        return Err(DriverError::Open("database path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(DriverError::Open("database path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(DriverError::Open(
                "database path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(DriverError::Open(
            "database path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Creates the parent directory for a database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), DriverError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| DriverError::Open(err.to_string()))
}

/// Applies the configured pragmas to a freshly opened connection.
fn apply_pragmas(
    connection: &rusqlite::Connection,
    config: &SqliteDriverConfig,
) -> Result<(), DriverError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| DriverError::Open(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| DriverError::Open(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| DriverError::Open(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| DriverError::Open(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Shared handle to one `SQLite` connection, `None` once closed.
type SharedConnection = Arc<Mutex<Option<rusqlite::Connection>>>;

/// Mutex-guarded `SQLite` connection.
///
/// # Invariants
/// - One transaction runs at a time per connection.
/// - Close is idempotent; use after close fails with a driver error.
struct SqliteConnection {
    /// Underlying connection, taken on close.
    inner: SharedConnection,
}

impl Connection for SqliteConnection {
    fn begin(&self) -> Result<Box<dyn Transaction>, DriverError> {
        {
            let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let connection = guard
                .as_ref()
                .ok_or_else(|| DriverError::Begin("connection is closed".to_string()))?;
            connection
                .execute_batch("BEGIN IMMEDIATE;")
                .map_err(|err| DriverError::Begin(err.to_string()))?;
        }
        Ok(Box::new(SqliteTransaction {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn close(&self) -> Result<(), DriverError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(connection) = guard.take() else {
            return Ok(());
        };
        if let Err((connection, err)) = connection.close() {
            *guard = Some(connection);
            return Err(DriverError::Close(err.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Transaction
// ============================================================================

/// Transaction driven through explicit transaction-control statements.
struct SqliteTransaction {
    /// Shared connection the transaction runs on.
    inner: SharedConnection,
}

impl SqliteTransaction {
    /// Runs a transaction-control statement, mapping a missing transaction to
    /// the benign already-finished outcome.
    fn finalize(
        &self,
        statement: &str,
        map_err: fn(String) -> DriverError,
    ) -> Result<(), DriverError> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(connection) = guard.as_ref() else {
            return Err(map_err("connection is closed".to_string()));
        };
        connection.execute_batch(statement).map_err(|err| {
            let message = err.to_string();
            if message.contains("no transaction is active") {
                DriverError::AlreadyFinished
            } else {
                map_err(message)
            }
        })
    }
}

impl Transaction for SqliteTransaction {
    fn exec(&mut self, statement: &str, args: &[SqlValue]) -> Result<u64, DriverError> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = guard
            .as_ref()
            .ok_or_else(|| DriverError::Exec("connection is closed".to_string()))?;
        let rows = connection
            .execute(statement, params_from_iter(args.iter().map(to_sqlite_value)))
            .map_err(|err| DriverError::Exec(err.to_string()))?;
        Ok(u64::try_from(rows).unwrap_or(u64::MAX))
    }

    fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.finalize("COMMIT;", DriverError::Commit)
    }

    fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.finalize("ROLLBACK;", DriverError::Rollback)
    }
}

/// Converts a driver-agnostic value into its `SQLite` parameter rendering.
fn to_sqlite_value(value: &SqlValue) -> rusqlite::types::Value {
    match value {
        SqlValue::Null => rusqlite::types::Value::Null,
        SqlValue::Integer(value) => rusqlite::types::Value::Integer(*value),
        SqlValue::Real(value) => rusqlite::types::Value::Real(*value),
        SqlValue::Text(value) => rusqlite::types::Value::Text(value.clone()),
        SqlValue::Blob(value) => rusqlite::types::Value::Blob(value.clone()),
    }
}
