use anyhow::Result;
use clap::Args;
use config::{ConfigLayer, DatabaseLayer, HarnessConfig, MigrationLayer, RunnerLayer};
use std::sync::Arc;
use testing::{
    CommandUnit, DatabaseLifecycle, Phase, PhasePlan, PhaseRunner, SETUP_PHASE, SchemaMaterializer,
    SetupFailure, database_phases_with_failure,
};

use crate::{output, ux_error};

pub const TESTS_PHASE: &str = "tests";

#[derive(Args)]
pub struct RunArgs {
    #[arg(
        short = 'c',
        long = "command",
        value_name = "SHELL",
        help = "Shell command to run against the database (repeatable, run in parallel)"
    )]
    pub commands: Vec<String>,

    #[arg(long, help = "Maximum number of units running at once")]
    pub workers: Option<usize>,

    #[arg(long, help = "PostgreSQL image tag")]
    pub tag: Option<String>,

    #[arg(long, help = "Skip the schema migration command")]
    pub no_migrate: bool,

    #[arg(last = true, value_name = "ARGV", help = "Command to run, given after --")]
    pub argv: Vec<String>
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigLayer {
        flag_overrides(self.workers, self.tag.clone(), self.no_migrate)
    }

    fn units(&self) -> Vec<CommandUnit> {
        let mut units = Vec::new();
        if !self.argv.is_empty() {
            units.push(CommandUnit::new(self.argv.clone()));
        }
        for command in &self.commands {
            units.push(
                CommandUnit::new(vec!["sh".to_string(), "-c".to_string(), command.clone()])
                    .named(command.clone()),
            );
        }
        units
    }
}

/// Only flags actually given end up set in the layer.
pub(crate) fn flag_overrides(
    workers: Option<usize>,
    tag: Option<String>,
    no_migrate: bool,
) -> ConfigLayer {
    ConfigLayer {
        database: DatabaseLayer {
            tag,
            ..Default::default()
        },
        migration: MigrationLayer {
            enabled: no_migrate.then_some(false),
            ..Default::default()
        },
        runner: RunnerLayer { workers },
        ..Default::default()
    }
}

fn plan(config: &HarnessConfig, units: Vec<CommandUnit>, failure: &SetupFailure) -> PhasePlan {
    let lifecycle = Arc::new(DatabaseLifecycle::postgres(&config.database));
    let materializer = SchemaMaterializer::from_config(&config.migration, &config.database);
    let (setup, teardown) = database_phases_with_failure(
        lifecycle,
        materializer,
        &config.database.url_env_var,
        failure.clone(),
    );

    let tests = units
        .into_iter()
        .fold(Phase::new(TESTS_PHASE).depends_on(SETUP_PHASE), |phase, unit| {
            phase.with_unit(unit)
        });

    PhasePlan::new()
        .with_phase(setup)
        .with_phase(tests)
        .with_phase(teardown)
}

pub async fn run(args: RunArgs, config: HarnessConfig) -> Result<()> {
    let units = args.units();
    if units.is_empty() {
        ux_error::no_test_command().display();
        anyhow::bail!("Nothing to run");
    }

    output::info(&format!(
        "Running {} command(s) against {} with {} worker(s)",
        units.len(),
        config.database.image_ref(),
        config.runner.workers
    ));

    let failure = SetupFailure::new();
    let report = PhaseRunner::new(config.runner.workers)
        .run(plan(&config, units, &failure))
        .await?;
    output::report(&report);

    if report.passed() {
        output::success("All phases passed");
        return Ok(());
    }

    if let Some(error) = failure.take() {
        ux_error::setup_failed(&error, &config).display();
        anyhow::bail!("Setup failed");
    }
    anyhow::bail!("Test run failed")
}
