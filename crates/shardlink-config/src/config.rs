// crates/shardlink-config/src/config.rs
// ============================================================================
// Module: Shardlink Configuration
// Description: Configuration loading and validation for shard topologies.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: shardlink-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and count
//! limits. Missing or invalid configuration fails closed: nothing is
//! registered from a file that does not validate, and duplicate keys across
//! the flat shard+replica namespace are rejected here rather than silently
//! overwriting entries later.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use shardlink_core::ReplicaSpec;
use shardlink_core::ReplicationStrategy;
use shardlink_core::ShardSpec;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "shardlink.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "SHARDLINK_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of shards in one topology.
pub(crate) const MAX_SHARDS: usize = 1024;
/// Maximum number of replicas per shard.
pub(crate) const MAX_REPLICAS_PER_SHARD: usize = 16;
/// Maximum length of a shard or replica key.
pub(crate) const MAX_KEY_LENGTH: usize = 128;
/// Maximum length of a driver name.
pub(crate) const MAX_DRIVER_NAME_LENGTH: usize = 64;
/// Maximum length of a DSN.
pub(crate) const MAX_DSN_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// One replica endpoint in the topology file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicaConfig {
    /// Replica key, unique within the flat namespace.
    pub key: String,
    /// Driver name the replica connects through.
    pub driver: String,
    /// Replica connection string.
    pub dsn: String,
}

/// One shard endpoint in the topology file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardConfig {
    /// Shard key, unique within the flat namespace.
    pub key: String,
    /// Driver name the shard connects through.
    pub driver: String,
    /// Shard connection string.
    pub dsn: String,
    /// Ordered replica endpoints written under replication.
    #[serde(default)]
    pub replicas: Vec<ReplicaConfig>,
}

/// Shardlink topology configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardingConfig {
    /// Replication strategy applied by coordinator callers.
    #[serde(default)]
    pub replication_strategy: ReplicationStrategy,
    /// Ordered shard endpoints.
    pub shards: Vec<ShardConfig>,
}

impl ShardingConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then the `SHARDLINK_CONFIG` environment variable, then
    /// `shardlink.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards.is_empty() {
            return Err(ConfigError::Invalid("at least one shard is required".to_string()));
        }
        if self.shards.len() > MAX_SHARDS {
            return Err(ConfigError::Invalid(format!(
                "too many shards: {} (max {MAX_SHARDS})",
                self.shards.len()
            )));
        }
        let mut seen_keys: BTreeSet<&str> = BTreeSet::new();
        for shard in &self.shards {
            validate_endpoint(&shard.key, &shard.driver, &shard.dsn)?;
            if !seen_keys.insert(shard.key.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate key: {}", shard.key)));
            }
            if shard.replicas.len() > MAX_REPLICAS_PER_SHARD {
                return Err(ConfigError::Invalid(format!(
                    "shard {} has too many replicas: {} (max {MAX_REPLICAS_PER_SHARD})",
                    shard.key,
                    shard.replicas.len()
                )));
            }
            for replica in &shard.replicas {
                validate_endpoint(&replica.key, &replica.driver, &replica.dsn)?;
                if !seen_keys.insert(replica.key.as_str()) {
                    return Err(ConfigError::Invalid(format!("duplicate key: {}", replica.key)));
                }
            }
        }
        Ok(())
    }

    /// Converts the configuration into registrable shard descriptors.
    #[must_use]
    pub fn into_specs(self) -> Vec<ShardSpec> {
        self.shards
            .into_iter()
            .map(|shard| {
                let replicas = shard
                    .replicas
                    .into_iter()
                    .map(|replica| ReplicaSpec::new(replica.key, replica.driver, replica.dsn))
                    .collect();
                ShardSpec::new(shard.key, shard.driver, shard.dsn).with_replicas(replicas)
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Validates one endpoint's key, driver, and DSN fields.
fn validate_endpoint(key: &str, driver: &str, dsn: &str) -> Result<(), ConfigError> {
    if key.is_empty() {
        return Err(ConfigError::Invalid("endpoint key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "endpoint key exceeds length limit: {key}"
        )));
    }
    if driver.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "endpoint {key} driver must not be empty"
        )));
    }
    if driver.len() > MAX_DRIVER_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "endpoint {key} driver name exceeds length limit"
        )));
    }
    if dsn.is_empty() {
        return Err(ConfigError::Invalid(format!("endpoint {key} dsn must not be empty")));
    }
    if dsn.len() > MAX_DSN_LENGTH {
        return Err(ConfigError::Invalid(format!("endpoint {key} dsn exceeds length limit")));
    }
    Ok(())
}

/// Resolves the configuration path from the explicit argument, the
/// environment override, or the default filename.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}
