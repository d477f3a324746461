use assert_cmd::{Command, cargo_bin_cmd};
use std::io::Write;

fn dbharness() -> Command {
    let mut cmd = cargo_bin_cmd!("dbharness");
    for key in [
        "DBH_IMAGE",
        "DBH_TAG",
        "DBH_WORKERS",
        "DBH_LOG_LEVEL",
        "DBH_MIGRATION_ENABLED",
        "DBH_MIGRATION_COMMAND",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

mod help_and_version {
    use super::*;
    use predicates::prelude::predicate;

    #[test]
    fn test_help_flag() {
        dbharness()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage:"))
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("up"));
    }

    #[test]
    fn test_version_flag() {
        dbharness()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dbharness"));
    }

    #[test]
    fn test_no_args_shows_help() {
        dbharness()
            .assert()
            .failure()
            .stderr(predicate::str::contains("Usage:"));
    }

    #[test]
    fn test_run_help_mentions_trailing_command() {
        dbharness()
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--no-migrate"))
            .stdout(predicate::str::contains("--workers"));
    }
}

mod config_subcommand {
    use super::*;
    use predicates::prelude::PredicateBooleanExt;
    use predicates::prelude::predicate;

    #[test]
    fn test_prints_defaults_with_masked_password() {
        dbharness()
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("image = \"postgres\""))
            .stdout(predicate::str::contains("********"))
            .stdout(predicate::str::contains("password = \"harness\"").not());
    }

    #[test]
    fn test_env_overrides_defaults() {
        dbharness()
            .arg("config")
            .env("DBH_TAG", "15-alpine")
            .env("DBH_WORKERS", "12")
            .assert()
            .success()
            .stdout(predicate::str::contains("tag = \"15-alpine\""))
            .stdout(predicate::str::contains("workers = 12"));
    }

    #[test]
    fn test_config_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[database]\nimage = \"postgis/postgis\"").unwrap();

        dbharness()
            .arg("--config")
            .arg(file.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("image = \"postgis/postgis\""));
    }

    #[test]
    fn test_yaml_format() {
        dbharness()
            .args(["config", "--format", "yaml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("url_env_var: DATABASE_URL"));
    }

    #[test]
    fn test_invalid_worker_count_is_rejected() {
        dbharness()
            .arg("config")
            .env("DBH_WORKERS", "0")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration error"));
    }

    #[test]
    fn test_unparseable_env_value_is_rejected() {
        dbharness()
            .arg("config")
            .env("DBH_WORKERS", "many")
            .assert()
            .failure()
            .stderr(predicate::str::contains("DBH_WORKERS"));
    }

    #[test]
    fn test_missing_config_file_is_rejected() {
        dbharness()
            .args(["--config", "/nonexistent/dbharness.toml", "config"])
            .assert()
            .failure();
    }
}

mod run_subcommand {
    use super::*;
    use predicates::prelude::predicate;

    #[test]
    fn test_run_without_command_fails_before_provisioning() {
        dbharness()
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No test command given"));
    }

    #[test]
    fn test_unstartable_container_prints_docker_hint() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\nimage = \"dbharness-missing/postgres\"\ntag = \"0\"\nstartup_timeout_seconds = 60\n\n[migration]\nenabled = false"
        )
        .unwrap();

        dbharness()
            .arg("--config")
            .arg(file.path())
            .args(["run", "--", "true"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Could not start the database container"))
            .stderr(predicate::str::contains("docker info"));
    }
}

mod completion_subcommand {
    use super::*;
    use predicates::prelude::predicate;

    #[test]
    fn test_bash_completion() {
        dbharness()
            .args(["completion", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("dbharness"));
    }
}
