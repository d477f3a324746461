use anyhow::Result;
use clap::Args;
use config::{ConfigLayer, HarnessConfig};
use std::future::Future;
use testing::{DatabaseLifecycle, SchemaMaterializer};

use super::run::flag_overrides;
use crate::{output, ux_error};

#[derive(Args)]
pub struct UpArgs {
    #[arg(long, help = "PostgreSQL image tag")]
    pub tag: Option<String>,

    #[arg(long, help = "Skip the schema migration command")]
    pub no_migrate: bool
}

impl UpArgs {
    pub fn overrides(&self) -> ConfigLayer {
        flag_overrides(None, self.tag.clone(), self.no_migrate)
    }
}

/// Drives `work` to completion even when `interrupt` resolves first, and
/// reports whether it did. The step is never abandoned halfway, so whatever
/// it acquired can still be released afterwards.
async fn finish_step<F, I>(work: F, interrupt: I) -> (F::Output, bool)
where
    F: Future,
    I: Future,
{
    tokio::pin!(work);
    tokio::select! {
        done = &mut work => (done, false),
        _ = interrupt => {
            output::warn("Interrupted; finishing the current step before releasing the database");
            (work.await, true)
        }
    }
}

pub async fn run(_args: UpArgs, config: HarnessConfig) -> Result<()> {
    let lifecycle = DatabaseLifecycle::postgres(&config.database);

    let (started, interrupted) = finish_step(lifecycle.start(), tokio::signal::ctrl_c()).await;
    let url = match started {
        Ok(url) => url,
        Err(e) => {
            ux_error::provision_failed(&e, config.database.startup_timeout_seconds).display();
            anyhow::bail!("Database provisioning failed");
        }
    };
    if interrupted {
        lifecycle.stop().await?;
        anyhow::bail!("Interrupted");
    }

    if let Some(materializer) = SchemaMaterializer::from_config(&config.migration, &config.database)
    {
        let (migrated, interrupted) =
            finish_step(materializer.materialize(&url), tokio::signal::ctrl_c()).await;
        if let Err(e) = migrated {
            ux_error::migration_failed(&materializer.command_line(), &e.to_string()).display();
            lifecycle.stop().await?;
            anyhow::bail!("Schema migration failed");
        }
        if interrupted {
            lifecycle.stop().await?;
            anyhow::bail!("Interrupted");
        }
    }

    println!("{}={}", config.database.url_env_var, url);
    output::hint("Press Ctrl-C to stop the database");

    tokio::signal::ctrl_c().await?;

    output::info("Stopping database");
    lifecycle.stop().await?;
    output::success("Database stopped");
    Ok(())
}
