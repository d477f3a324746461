use colored::Colorize;
use config::HarnessConfig;
use errors::{ProvisionError, SetupError};

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn docker_unavailable(reason: &str) -> UxError {
    UxError::new("Could not start the database container")
        .why(reason.to_string())
        .fix("Make sure Docker (or a compatible runtime) is running")
        .fix("Set DOCKER_HOST if the daemon is not on the default socket")
        .suggest("docker info")
}

pub fn database_not_ready(timeout_secs: u64) -> UxError {
    UxError::new(format!("Database did not become ready within {}s", timeout_secs))
        .why("The container started but never accepted connections")
        .fix("Pull the image ahead of time so startup is not spent downloading")
        .fix("Raise database.startup_timeout_seconds in your config")
        .suggest("dbharness run --config dbharness.toml -- cargo test")
}

pub fn migration_failed(command: &str, reason: &str) -> UxError {
    UxError::new(format!("Schema migration '{}' failed", command))
        .why(reason.to_string())
        .fix("Run the migration command by hand against the printed URL")
        .fix("Or skip migrations with --no-migrate")
        .suggest("dbharness up --no-migrate")
}

/// Hint block for a provisioning failure.
pub fn provision_failed(error: &ProvisionError, timeout_secs: u64) -> UxError {
    match error {
        ProvisionError::Start { reason, .. } => docker_unavailable(reason),
        ProvisionError::Timeout { .. } | ProvisionError::Unreachable { .. } => {
            database_not_ready(timeout_secs).why(error.to_string())
        }
        ProvisionError::Port { .. } => docker_unavailable(&error.to_string())
    }
}

/// Hint block for whatever stopped the setup phase.
pub fn setup_failed(error: &SetupError, config: &HarnessConfig) -> UxError {
    match error {
        SetupError::Provision(e) => provision_failed(e, config.database.startup_timeout_seconds),
        SetupError::Migration(e) => {
            migration_failed(&config.migration.command.join(" "), &e.to_string())
        }
    }
}

pub fn config_error(message: &str) -> UxError {
    UxError::new("Configuration error")
        .why(message.to_string())
        .fix("Check the configuration file and DBH_* environment variables")
        .suggest("dbharness config")
}

pub fn no_test_command() -> UxError {
    UxError::new("No test command given")
        .why("dbharness run needs at least one command to run against the database")
        .fix("Pass the command after --")
        .fix("Or repeat --command for several commands run in parallel")
        .suggest("dbharness run -- cargo test")
}
