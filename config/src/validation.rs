//! # Configuration Validation
//!
//! Validates configuration structures using the `validator` crate.

use crate::config::HarnessConfig;
use validator::Validate;

/// Validate a merged configuration.
///
/// ## Validation Rules
/// - `database.image`, `database.tag`, `database.url_env_var`: non-empty
/// - `database.database`, `database.username`: 1-63 characters
/// - `database.startup_timeout_seconds`: 1-3600
/// - `migration.command`: at least one element
/// - `runner.workers`: 1-256
/// - `observability.logging_level`: trace, debug, info, warn or error
pub fn validate(config: &HarnessConfig) -> Result<(), validator::ValidationErrors> {
    config.validate()
}
