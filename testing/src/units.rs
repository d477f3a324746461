//! Ready-made units: database setup, database teardown and external
//! commands.

use crate::env::SharedEnv;
use crate::lifecycle::DatabaseLifecycle;
use crate::phase::{Phase, TestUnit, UnitError};
use crate::schema::SchemaMaterializer;
use async_trait::async_trait;
use errors::SetupError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::process::Command;

pub const SETUP_PHASE: &str = "setup";
pub const TEARDOWN_PHASE: &str = "teardown";

/// Keeps the typed error of a failed setup unit. The run report only carries
/// its message; callers that want to react to the kind of failure read it
/// back from here after the run.
#[derive(Clone, Default)]
pub struct SetupFailure(Arc<Mutex<Option<SetupError>>>);

impl SetupFailure {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, error: SetupError) {
        *self.0.lock() = Some(error);
    }

    pub fn take(&self) -> Option<SetupError> {
        self.0.lock().take()
    }
}

/// Starts (or reuses) the database, publishes its URL and materializes the
/// schema. Any failure here fails the setup phase.
pub struct StartDatabase {
    lifecycle: Arc<DatabaseLifecycle>,
    materializer: Option<SchemaMaterializer>,
    url_env_var: String,
    failure: SetupFailure
}

impl StartDatabase {
    pub fn new(lifecycle: Arc<DatabaseLifecycle>, url_env_var: impl Into<String>) -> Self {
        Self {
            lifecycle,
            materializer: None,
            url_env_var: url_env_var.into(),
            failure: SetupFailure::default()
        }
    }

    pub fn with_materializer(mut self, materializer: Option<SchemaMaterializer>) -> Self {
        self.materializer = materializer;
        self
    }

    pub fn with_failure(mut self, failure: SetupFailure) -> Self {
        self.failure = failure;
        self
    }

    async fn setup(&self, env: &SharedEnv) -> Result<(), SetupError> {
        let url = self.lifecycle.start().await?;
        env.publish(self.url_env_var.clone(), url.clone());

        if let Some(materializer) = &self.materializer {
            materializer.materialize(&url).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TestUnit for StartDatabase {
    fn name(&self) -> &str {
        "start database"
    }

    async fn run(&self, env: &SharedEnv) -> Result<(), UnitError> {
        match self.setup(env).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                self.failure.record(e);
                Err(message.into())
            }
        }
    }
}

/// Releases the database. Failures are logged and reported on the teardown
/// phase only.
pub struct StopDatabase {
    lifecycle: Arc<DatabaseLifecycle>
}

impl StopDatabase {
    pub fn new(lifecycle: Arc<DatabaseLifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl TestUnit for StopDatabase {
    fn name(&self) -> &str {
        "stop database"
    }

    async fn run(&self, _env: &SharedEnv) -> Result<(), UnitError> {
        if let Err(e) = self.lifecycle.stop().await {
            tracing::warn!("Database release failed: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Runs an external program with the run environment exported to it.
pub struct CommandUnit {
    name: String,
    argv: Vec<String>
}

impl CommandUnit {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            name: argv.join(" "),
            argv
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl TestUnit for CommandUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, env: &SharedEnv) -> Result<(), UnitError> {
        let (program, args) = self.argv.split_first().ok_or("empty command")?;

        let mut command = Command::new(program);
        command.args(args);
        env.apply_to(&mut command);

        let status = command.status().await?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("exited with {}", status).into())
        }
    }
}

/// The setup phase (owning the teardown hook) and the teardown phase for a
/// database lifecycle. Dependents should `depends_on(SETUP_PHASE)`.
pub fn database_phases(
    lifecycle: Arc<DatabaseLifecycle>,
    materializer: Option<SchemaMaterializer>,
    url_env_var: &str,
) -> (Phase, Phase) {
    database_phases_with_failure(lifecycle, materializer, url_env_var, SetupFailure::new())
}

/// Like [`database_phases`], recording a setup failure into `failure`.
pub fn database_phases_with_failure(
    lifecycle: Arc<DatabaseLifecycle>,
    materializer: Option<SchemaMaterializer>,
    url_env_var: &str,
    failure: SetupFailure,
) -> (Phase, Phase) {
    let setup = Phase::new(SETUP_PHASE)
        .with_teardown(TEARDOWN_PHASE)
        .with_unit(
            StartDatabase::new(lifecycle.clone(), url_env_var)
                .with_materializer(materializer)
                .with_failure(failure),
        );
    let teardown = Phase::new(TEARDOWN_PHASE).with_unit(StopDatabase::new(lifecycle));
    (setup, teardown)
}
