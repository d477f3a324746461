use anyhow::{Context, Result};
use config::{ConfigLayer, HarnessConfig, load_from_env, load_from_file, merge_configs, validate};
use std::path::Path;

/// Defaults < file < `DBH_*` environment < flags, then validated.
pub fn load(path: Option<&Path>, flags: ConfigLayer) -> Result<HarnessConfig> {
    let from_file = match path {
        Some(path) => load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConfigLayer::default()
    };
    let from_env = load_from_env().context("Invalid DBH_* environment variable")?;

    let config = merge_configs(
        HarnessConfig::default(),
        from_file,
        "file",
        from_env,
        "env",
        Some(flags),
        "cli",
    );

    if let Err(errors) = validate(&config) {
        crate::ux_error::config_error(&errors.to_string()).display();
        anyhow::bail!("Invalid configuration");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{DatabaseLayer, RunnerLayer};
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    fn clear_env() {
        for key in ["DBH_TAG", "DBH_WORKERS", "DBH_MIGRATION_ENABLED"] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_flags_override_file() {
        clear_env();
        let file = config_file("[runner]\nworkers = 8\n\n[database]\ntag = \"15\"");

        let flags = ConfigLayer {
            runner: RunnerLayer { workers: Some(2) },
            ..Default::default()
        };
        let config = load(Some(file.path()), flags).unwrap();

        assert_eq!(config.runner.workers, 2);
        assert_eq!(config.database.tag, "15");
    }

    #[test]
    #[serial]
    fn test_default_equal_flag_and_env_beat_file() {
        clear_env();
        let file = config_file("[database]\ntag = \"15\"\n\n[migration]\nenabled = false");
        unsafe {
            env::set_var("DBH_MIGRATION_ENABLED", "true");
        }

        let flags = ConfigLayer {
            database: DatabaseLayer {
                tag: Some("16".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = load(Some(file.path()), flags);
        clear_env();
        let config = result.unwrap();

        assert_eq!(config.database.tag, "16");
        assert!(config.migration.enabled);
    }

    #[test]
    #[serial]
    fn test_invalid_merged_config_is_rejected() {
        clear_env();
        let file = config_file("[observability]\nlogging_level = \"loud\"");

        assert!(load(Some(file.path()), ConfigLayer::default()).is_err());
    }

    #[test]
    #[serial]
    fn test_missing_file_is_error() {
        clear_env();
        let result = load(
            Some(Path::new("/nonexistent/dbharness.toml")),
            ConfigLayer::default(),
        );
        assert!(result.is_err());
    }
}
