//! Schema materialization through an external migration command.

use config::{DatabaseConfig, MigrationConfig};
use errors::MigrationError;
use std::process::Stdio;
use tokio::process::Command;

/// Runs a fixed migration command against a freshly provisioned database.
///
/// The connection URL is injected under `url_env_var`; stdio is inherited so
/// the tool's output lands in the run log. There are no retries: a failing
/// migration is an environment defect.
#[derive(Debug, Clone)]
pub struct SchemaMaterializer {
    command: Vec<String>,
    url_env_var: String
}

impl SchemaMaterializer {
    pub fn new(command: Vec<String>, url_env_var: impl Into<String>) -> Self {
        Self {
            command,
            url_env_var: url_env_var.into()
        }
    }

    /// `None` when migrations are disabled.
    pub fn from_config(migration: &MigrationConfig, database: &DatabaseConfig) -> Option<Self> {
        migration
            .enabled
            .then(|| Self::new(migration.command.clone(), database.url_env_var.clone()))
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    pub async fn materialize(&self, url: &str) -> Result<(), MigrationError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(MigrationError::EmptyCommand)?;

        tracing::info!("Running schema migrations...");
        tracing::debug!("Migration command: {}", self.command_line());

        let status = Command::new(program)
            .args(args)
            .env(&self.url_env_var, url)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| MigrationError::Spawn {
                command: self.command_line(),
                reason: e.to_string()
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(MigrationError::NonZeroExit {
                command: self.command_line(),
                code: status.code()
            })
        }
    }
}
