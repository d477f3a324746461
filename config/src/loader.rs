//! # Environment Variable Loader
//!
//! Loads configuration from `DBH_*` environment variables. Unset variables
//! are left unset; set-but-unparseable variables are errors.

use crate::layer::{ConfigLayer, DatabaseLayer, MigrationLayer, ObservabilityLayer, RunnerLayer};
use std::env;

/// Environment variable loading error.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String }
}

/// Load the configuration layer set through environment variables.
///
/// ## Environment Variables
/// - `DBH_IMAGE`: Engine image
/// - `DBH_TAG`: Engine version tag
/// - `DBH_DATABASE`: Database name
/// - `DBH_USERNAME`: Superuser name
/// - `DBH_PASSWORD`: Superuser password
/// - `DBH_STARTUP_TIMEOUT_SECONDS`: Provisioning bound
/// - `DBH_URL_ENV_VAR`: Name the URL is published under
/// - `DBH_MIGRATION_ENABLED`: Run migrations (true/false)
/// - `DBH_MIGRATION_COMMAND`: Whitespace-separated argv
/// - `DBH_WORKERS`: Concurrent units per phase
/// - `DBH_LOG_LEVEL`: Logging level
///
/// Unset variables stay unset in the layer.
pub fn load_from_env() -> Result<ConfigLayer, EnvError> {
    Ok(ConfigLayer {
        database: load_database_from_env()?,
        migration: load_migration_from_env()?,
        runner: RunnerLayer {
            workers: parse_env("DBH_WORKERS")?
        },
        observability: ObservabilityLayer {
            logging_level: env::var("DBH_LOG_LEVEL").ok()
        }
    })
}

fn load_database_from_env() -> Result<DatabaseLayer, EnvError> {
    Ok(DatabaseLayer {
        image: env::var("DBH_IMAGE").ok(),
        tag: env::var("DBH_TAG").ok(),
        database: env::var("DBH_DATABASE").ok(),
        username: env::var("DBH_USERNAME").ok(),
        password: env::var("DBH_PASSWORD").ok(),
        startup_timeout_seconds: parse_env("DBH_STARTUP_TIMEOUT_SECONDS")?,
        url_env_var: env::var("DBH_URL_ENV_VAR").ok()
    })
}

fn load_migration_from_env() -> Result<MigrationLayer, EnvError> {
    Ok(MigrationLayer {
        enabled: parse_env("DBH_MIGRATION_ENABLED")?,
        command: env::var("DBH_MIGRATION_COMMAND")
            .ok()
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
    })
}

fn parse_env<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| EnvError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string()
            }),
        Err(_) => Ok(None)
    }
}
