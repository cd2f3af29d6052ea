// crates/shardlink-cli/src/main.rs
// ============================================================================
// Module: Shardlink CLI Entry Point
// Description: Command dispatcher for topology validation and execution.
// Purpose: Provide a safe, local CLI over the sharding coordinator.
// Dependencies: clap, serde_json, shardlink-config, shardlink-core,
//               shardlink-driver-sqlite, thiserror
// ============================================================================

//! ## Overview
//! The Shardlink CLI validates topology configuration files, lists registered
//! shard keys, and executes statements against one shard (with a replication
//! strategy) or across a selection of shards (with fail-fast or aggregate
//! error policy). The `sqlite` and `memory` drivers are registered; the
//! in-memory driver exists for local experiments only.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use shardlink_config::ShardingConfig;
use shardlink_core::DriverRegistry;
use shardlink_core::MemoryDriver;
use shardlink_core::ReplicationCoordinator;
use shardlink_core::ReplicationStrategy;
use shardlink_core::ShardKey;
use shardlink_core::ShardRegistry;
use shardlink_core::SqlValue;
use shardlink_core::TxDisposition;
use shardlink_driver_sqlite::SqliteDriver;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Client-side database-sharding coordinator.
#[derive(Parser, Debug)]
#[command(name = "shardlink", version, about)]
struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validates a topology configuration file.
    Validate(ValidateCommand),
    /// Lists the shard keys of a topology.
    Keys(KeysCommand),
    /// Executes a statement on one shard with a replication strategy.
    Exec(ExecCommand),
    /// Executes a statement across selected shards.
    ExecAll(ExecAllCommand),
}

/// Arguments for topology validation.
#[derive(Args, Debug)]
struct ValidateCommand {
    /// Config file path (defaults to shardlink.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for shard key listing.
#[derive(Args, Debug)]
struct KeysCommand {
    /// Config file path (defaults to shardlink.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for single-shard execution.
#[derive(Args, Debug)]
struct ExecCommand {
    /// Config file path (defaults to shardlink.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Target shard key.
    #[arg(long, value_name = "KEY")]
    shard: String,
    /// Replication strategy override (none | all | some).
    #[arg(long, value_name = "STRATEGY")]
    strategy: Option<String>,
    /// Bound text arguments for the statement, in order.
    #[arg(long = "arg", value_name = "TEXT", action = ArgAction::Append)]
    args: Vec<String>,
    /// Print registry stats as JSON after execution.
    #[arg(long, action = ArgAction::SetTrue)]
    stats: bool,
    /// The statement to execute.
    statement: String,
}

/// Arguments for multi-shard execution.
#[derive(Args, Debug)]
struct ExecAllCommand {
    /// Config file path (defaults to shardlink.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Restrict the run to these shard keys, in order (defaults to all).
    #[arg(long = "shard", value_name = "KEY", action = ArgAction::Append)]
    shards: Vec<String>,
    /// Stop at the first shard with an error instead of attempting all.
    #[arg(long, action = ArgAction::SetTrue)]
    fail_fast: bool,
    /// Bound text arguments for the statement, in order.
    #[arg(long = "arg", value_name = "TEXT", action = ArgAction::Append)]
    args: Vec<String>,
    /// Print registry stats as JSON after execution.
    #[arg(long, action = ArgAction::SetTrue)]
    stats: bool,
    /// The statement to execute.
    statement: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(command) => command_validate(&command),
        Commands::Keys(command) => command_keys(&command),
        Commands::Exec(command) => command_exec(&command),
        Commands::ExecAll(command) => command_exec_all(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `validate` command.
fn command_validate(command: &ValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let replica_count: usize =
        config.shards.iter().map(|shard| shard.replicas.len()).sum();
    write_stdout_line(&format!(
        "configuration valid: {} shard(s), {} replica(s), strategy {}",
        config.shards.len(),
        replica_count,
        config.replication_strategy
    ))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `keys` command.
fn command_keys(command: &KeysCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let registry = build_registry(config)?;
    let mut keys: Vec<String> =
        registry.shard_keys().iter().map(ToString::to_string).collect();
    keys.sort();
    for key in keys {
        write_stdout_line(&key)?;
    }
    finish(&registry, false)
}

/// Executes the `exec` command.
fn command_exec(command: &ExecCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let strategy = match command.strategy.as_deref() {
        Some(label) => parse_strategy(label)?,
        None => config.replication_strategy,
    };
    let registry = build_registry(config)?;
    let outcome = ReplicationCoordinator::new(&registry).execute(
        &ShardKey::new(command.shard.as_str()),
        strategy,
        &command.statement,
        &text_args(&command.args),
    );
    if let Err(err) = outcome {
        let _ = registry.close_all();
        return Err(CliError::new(err.to_string()));
    }
    write_stdout_line(&format!("ok: shard [{}] strategy {strategy}", command.shard))?;
    finish(&registry, command.stats)
}

/// Executes the `exec-all` command.
fn command_exec_all(command: &ExecAllCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let registry = build_registry(config)?;
    let selection = if command.shards.is_empty() {
        registry.select_all()
    } else {
        let keys: Vec<ShardKey> =
            command.shards.iter().map(|key| ShardKey::new(key.as_str())).collect();
        registry.select(&keys)
    };
    let selection = if command.fail_fast { selection.fail_fast() } else { selection };
    let attempted = selection.len();
    let args = text_args(&command.args);
    let outcome = selection.run(|_, transaction| {
        transaction.exec(&command.statement, &args).map_err(Into::<shardlink_core::WorkError>::into)?;
        Ok(TxDisposition::Commit)
    });
    if let Err(err) = outcome {
        let _ = registry.close_all();
        return Err(CliError::new(err.to_string()));
    }
    write_stdout_line(&format!("ok: {attempted} shard(s)"))?;
    finish(&registry, command.stats)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates the topology configuration.
fn load_config(path: Option<&std::path::Path>) -> CliResult<ShardingConfig> {
    ShardingConfig::load(path).map_err(|err| CliError::new(err.to_string()))
}

/// Builds a shard registry with the built-in drivers and the configured
/// topology registered.
fn build_registry(config: ShardingConfig) -> CliResult<ShardRegistry> {
    let mut drivers = DriverRegistry::new();
    drivers
        .register(SqliteDriver::default())
        .map_err(|err| CliError::new(err.to_string()))?;
    drivers
        .register(MemoryDriver::new())
        .map_err(|err| CliError::new(err.to_string()))?;
    let registry = ShardRegistry::new(drivers);
    registry
        .register_all(config.into_specs())
        .map_err(|err| CliError::new(err.to_string()))?;
    Ok(registry)
}

/// Parses a replication strategy label.
fn parse_strategy(label: &str) -> CliResult<ReplicationStrategy> {
    match label {
        "none" => Ok(ReplicationStrategy::None),
        "all" => Ok(ReplicationStrategy::All),
        "some" => Ok(ReplicationStrategy::Some),
        other => Err(CliError::new(format!(
            "unknown replication strategy: {other} (expected none, all, or some)"
        ))),
    }
}

/// Renders CLI text arguments as bound statement values.
fn text_args(args: &[String]) -> Vec<SqlValue> {
    args.iter().map(|arg| SqlValue::from(arg.as_str())).collect()
}

/// Prints stats when requested and tears the registry down, reporting close
/// failures.
fn finish(registry: &ShardRegistry, stats: bool) -> CliResult<ExitCode> {
    drain(registry, stats)?;
    Ok(ExitCode::SUCCESS)
}

/// Prints stats when requested and closes every registered connection,
/// collecting close failures into one message.
fn drain(registry: &ShardRegistry, stats: bool) -> CliResult<()> {
    if stats {
        let snapshot = registry.stats_snapshot();
        let rendered = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| CliError::new(err.to_string()))?;
        write_stdout_line(&rendered)?;
    }
    let errors = registry.close_all();
    if errors.is_empty() {
        return Ok(());
    }
    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    Err(CliError::new(rendered.join("; ")))
}

/// Writes one line to stdout.
fn write_stdout_line(line: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(line.as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes an error line to stderr and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(b"error: ");
    let _ = stderr.write_all(message.as_bytes());
    let _ = stderr.write_all(b"\n");
    ExitCode::FAILURE
}
