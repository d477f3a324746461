//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)
//!
//! Each source is a [`ConfigLayer`]. A field a source set replaces the
//! lower value unconditionally; a field it left unset keeps the lower value.

use crate::config::HarnessConfig;
use crate::layer::ConfigLayer;

/// Merge configuration sources, lowest priority first.
///
/// ## Usage
/// ```rust,no_run
/// use config::{HarnessConfig, load_from_env, load_from_file, merge_configs};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = merge_configs(
///         HarnessConfig::default(),
///         load_from_file(Path::new("harness.toml"))?,
///         "file",
///         load_from_env()?,
///         "env",
///         None,
///         "cli",
///     );
///     println!("image: {}", config.database.image_ref());
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    defaults: HarnessConfig,
    file_layer: ConfigLayer,
    file_source_name: &str,
    env_layer: ConfigLayer,
    env_source_name: &str,
    cli_layer: Option<ConfigLayer>,
    cli_source_name: &str,
) -> HarnessConfig {
    let mut config = defaults;

    config = merge_with_logging(config, &file_layer, file_source_name);
    config = merge_with_logging(config, &env_layer, env_source_name);

    if let Some(cli) = cli_layer {
        config = merge_with_logging(config, &cli, cli_source_name);
    }

    config
}

fn merge_with_logging(mut base: HarnessConfig, layer: &ConfigLayer, source_name: &str) -> HarnessConfig {
    let mut changes = Vec::new();

    let db = &layer.database;
    merge_field(&mut base.database.image, db.image.as_ref(), "database.image", &mut changes);
    merge_field(&mut base.database.tag, db.tag.as_ref(), "database.tag", &mut changes);
    merge_field(
        &mut base.database.database,
        db.database.as_ref(),
        "database.database",
        &mut changes,
    );
    merge_field(
        &mut base.database.username,
        db.username.as_ref(),
        "database.username",
        &mut changes,
    );
    if let Some(password) = &db.password
        && *password != base.database.password
    {
        changes.push("database.password = ***".to_string());
        base.database.password.clone_from(password);
    }
    merge_field(
        &mut base.database.startup_timeout_seconds,
        db.startup_timeout_seconds.as_ref(),
        "database.startup_timeout_seconds",
        &mut changes,
    );
    merge_field(
        &mut base.database.url_env_var,
        db.url_env_var.as_ref(),
        "database.url_env_var",
        &mut changes,
    );

    merge_field(
        &mut base.migration.enabled,
        layer.migration.enabled.as_ref(),
        "migration.enabled",
        &mut changes,
    );
    merge_field(
        &mut base.migration.command,
        layer.migration.command.as_ref(),
        "migration.command",
        &mut changes,
    );

    merge_field(
        &mut base.runner.workers,
        layer.runner.workers.as_ref(),
        "runner.workers",
        &mut changes,
    );

    merge_field(
        &mut base.observability.logging_level,
        layer.observability.logging_level.as_ref(),
        "observability.logging_level",
        &mut changes,
    );

    for change in &changes {
        tracing::debug!(source = source_name, "config override: {}", change);
    }

    base
}

fn merge_field<T>(base: &mut T, value: Option<&T>, name: &str, changes: &mut Vec<String>)
where
    T: Clone + PartialEq + std::fmt::Debug,
{
    if let Some(value) = value
        && value != base
    {
        changes.push(format!("{} = {:?}", name, value));
        base.clone_from(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{DatabaseLayer, MigrationLayer, RunnerLayer};

    fn merge(file: ConfigLayer, env: ConfigLayer, cli: Option<ConfigLayer>) -> HarnessConfig {
        merge_configs(HarnessConfig::default(), file, "file", env, "env", cli, "cli")
    }

    #[test]
    fn test_merge_configs_precedence() {
        let file_layer = ConfigLayer {
            database: DatabaseLayer {
                tag: Some("15".to_string()),
                startup_timeout_seconds: Some(120),
                ..Default::default()
            },
            ..Default::default()
        };

        let env_layer = ConfigLayer {
            database: DatabaseLayer {
                startup_timeout_seconds: Some(30),
                ..Default::default()
            },
            ..Default::default()
        };

        let cli_layer = ConfigLayer {
            runner: RunnerLayer { workers: Some(1) },
            ..Default::default()
        };

        let merged = merge(file_layer, env_layer, Some(cli_layer));

        assert_eq!(merged.database.tag, "15");
        assert_eq!(merged.database.startup_timeout_seconds, 30);
        assert_eq!(merged.runner.workers, 1);
        assert_eq!(merged.database.image, "postgres");
    }

    #[test]
    fn test_unset_fields_do_not_clobber() {
        let file_layer = ConfigLayer {
            migration: MigrationLayer {
                enabled: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge(file_layer, ConfigLayer::default(), None);

        assert!(!merged.migration.enabled);
    }

    #[test]
    fn test_default_valued_override_beats_lower_layer() {
        let file_layer = ConfigLayer {
            database: DatabaseLayer {
                tag: Some("15".to_string()),
                password: Some("from-file".to_string()),
                ..Default::default()
            },
            migration: MigrationLayer {
                enabled: Some(false),
                ..Default::default()
            },
            runner: RunnerLayer { workers: Some(16) },
            ..Default::default()
        };

        let env_layer = ConfigLayer {
            database: DatabaseLayer {
                password: Some("harness".to_string()),
                ..Default::default()
            },
            migration: MigrationLayer {
                enabled: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };

        let cli_layer = ConfigLayer {
            database: DatabaseLayer {
                tag: Some("16".to_string()),
                ..Default::default()
            },
            runner: RunnerLayer { workers: Some(4) },
            ..Default::default()
        };

        let merged = merge(file_layer, env_layer, Some(cli_layer));

        assert_eq!(merged.database.tag, "16");
        assert_eq!(merged.database.password, "harness");
        assert!(merged.migration.enabled);
        assert_eq!(merged.runner.workers, 4);
    }

    #[test]
    fn test_password_override_applies() {
        let env_layer = ConfigLayer {
            database: DatabaseLayer {
                password: Some("s3cret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge(ConfigLayer::default(), env_layer, None);

        assert_eq!(merged.database.password, "s3cret");
    }
}
