//! # Configuration Structures
//!
//! All configuration structures for the harness. Every structure uses `serde`
//! for (de)serialization and `validator` for range checks, and every field has
//! a default so a partial file is always accepted.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Top-level harness configuration.
///
/// ## Fields
/// - `database`: Container image and credentials for the ephemeral database
/// - `migration`: External schema command run after provisioning
/// - `runner`: Phase runner settings
/// - `observability`: Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct HarnessConfig {
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,

    #[serde(default)]
    #[validate(nested)]
    pub migration: MigrationConfig,

    #[serde(default)]
    #[validate(nested)]
    pub runner: RunnerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// Ephemeral database settings.
///
/// ## Fields
/// - `image`: Engine image name (default: "postgres")
/// - `tag`: Pinned engine version (default: "16")
/// - `database`: Database created inside the container (default: "harness")
/// - `username`: Superuser name (default: "harness")
/// - `password`: Superuser password (default: "harness")
/// - `startup_timeout_seconds`: Upper bound for start + readiness (default:
///   300, range: 1-3600)
/// - `url_env_var`: Environment variable the connection URL is published
///   under (default: "DATABASE_URL")
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_image")]
    #[validate(length(min = 1, max = 255))]
    pub image: String,

    #[serde(default = "default_database_tag")]
    #[validate(length(min = 1, max = 128))]
    pub tag: String,

    #[serde(default = "default_database_name")]
    #[validate(length(min = 1, max = 63))]
    pub database: String,

    #[serde(default = "default_database_username")]
    #[validate(length(min = 1, max = 63))]
    pub username: String,

    #[serde(default = "default_database_password")]
    #[validate(length(min = 1))]
    pub password: String,

    #[serde(default = "default_database_startup_timeout")]
    #[validate(range(min = 1, max = 3600))]
    pub startup_timeout_seconds: u64,

    #[serde(default = "default_database_url_env_var")]
    #[validate(length(min = 1, max = 255))]
    pub url_env_var: String
}

impl DatabaseConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_seconds)
    }

    /// `image:tag`, as shown in logs.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

fn default_database_image() -> String {
    "postgres".to_string()
}

fn default_database_tag() -> String {
    "16".to_string()
}

fn default_database_name() -> String {
    "harness".to_string()
}

fn default_database_username() -> String {
    "harness".to_string()
}

fn default_database_password() -> String {
    "harness".to_string()
}

fn default_database_startup_timeout() -> u64 {
    300
}

fn default_database_url_env_var() -> String {
    "DATABASE_URL".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            image: default_database_image(),
            tag: default_database_tag(),
            database: default_database_name(),
            username: default_database_username(),
            password: default_database_password(),
            startup_timeout_seconds: default_database_startup_timeout(),
            url_env_var: default_database_url_env_var()
        }
    }
}

/// Schema materialization settings.
///
/// ## Fields
/// - `enabled`: Run the command after provisioning (default: true)
/// - `command`: Program followed by its arguments (default: `sqlx migrate
///   run`)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MigrationConfig {
    #[serde(default = "default_migration_enabled")]
    pub enabled: bool,

    #[serde(default = "default_migration_command")]
    #[validate(length(min = 1))]
    pub command: Vec<String>
}

fn default_migration_enabled() -> bool {
    true
}

fn default_migration_command() -> Vec<String> {
    vec!["sqlx".to_string(), "migrate".to_string(), "run".to_string()]
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: default_migration_enabled(),
            command: default_migration_command()
        }
    }
}

/// Phase runner settings.
///
/// ## Fields
/// - `workers`: Maximum units running at once within a phase (default: 4,
///   range: 1-256)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RunnerConfig {
    #[serde(default = "default_runner_workers")]
    #[validate(range(min = 1, max = 256))]
    pub workers: usize
}

fn default_runner_workers() -> usize {
    4
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: default_runner_workers()
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level used when `RUST_LOG` is unset
    #[serde(default = "default_observability_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String
}

fn default_observability_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            logging_level: default_observability_logging_level()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.image_ref(), "postgres:16");
        assert_eq!(config.database.url_env_var, "DATABASE_URL");
        assert_eq!(config.migration.command, vec!["sqlx", "migrate", "run"]);
    }

    #[test]
    fn test_startup_timeout_conversion() {
        let config = DatabaseConfig {
            startup_timeout_seconds: 42,
            ..Default::default()
        };
        assert_eq!(config.startup_timeout(), Duration::from_secs(42));
    }

    #[test]
    fn test_invalid_logging_level_rejected() {
        let config = HarnessConfig {
            observability: ObservabilityConfig {
                logging_level: "verbose".to_string()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = HarnessConfig {
            runner: RunnerConfig { workers: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: HarnessConfig = toml::from_str("[database]\ntag = \"15\"\n").unwrap();
        assert_eq!(config.database.tag, "15");
        assert_eq!(config.database.image, "postgres");
        assert!(config.migration.enabled);
    }
}
