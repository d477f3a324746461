//! # Harness Errors
//!
//! Error taxonomy for the ephemeral test-database harness.
//!
//! - `ProvisionError` and `MigrationError` are fatal to the setup phase.
//! - `ReleaseError` is surfaced during teardown but never fails a run that
//!   already produced test results.
//! - `GateError` rejects a phase plan before anything runs.

use std::time::Duration;
use thiserror::Error;

/// Failures while acquiring a database instance.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Container {image} failed to start: {reason}")]
    Start { image: String, reason: String },

    #[error("Database did not become ready within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Database at {endpoint} unreachable after {attempts} attempts: {reason}")]
    Unreachable {
        endpoint: String,
        attempts: u32,
        reason: String
    },

    #[error("Could not resolve mapped port {port}: {reason}")]
    Port { port: u16, reason: String }
}

/// Failures while materializing the schema through an external command.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration command is empty")]
    EmptyCommand,

    #[error("Failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("`{command}` exited with {}", describe_code(.code))]
    NonZeroExit { command: String, code: Option<i32> }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string()
    }
}

/// Failures while stopping or removing a provisioned instance.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Failed to stop container {container_id}: {reason}")]
    Stop {
        container_id: String,
        reason: String
    },

    #[error("Failed to remove container {container_id}: {reason}")]
    Remove {
        container_id: String,
        reason: String
    }
}

/// Anything that can abort the setup phase.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Schema materialization failed: {0}")]
    Migration(#[from] MigrationError)
}

/// Phase plan validation errors.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Duplicate phase name: {phase}")]
    DuplicatePhase { phase: String },

    #[error("Phase {phase} depends on unknown phase {dependency}")]
    UnknownDependency { phase: String, dependency: String },

    #[error("Phase {phase} declares unknown teardown phase {teardown}")]
    UnknownTeardown { phase: String, teardown: String },

    #[error("Phase {teardown} is declared as teardown by both {first} and {second}")]
    SharedTeardown {
        teardown: String,
        first: String,
        second: String
    },

    #[error("Dependency cycle involving phase {phase}")]
    Cycle { phase: String },

    #[error("Runner needs at least one worker")]
    NoWorkers
}
