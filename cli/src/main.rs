use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;
pub mod ux_error;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Completion(_) => None,
        command => Some(commands::settings::load(
            cli.config.as_deref(),
            command.overrides(),
        )?)
    };

    let level = config
        .as_ref()
        .map_or("info", |c| c.observability.logging_level.as_str());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match (cli.command, config) {
        (Commands::Completion(args), _) => commands::completion::run(args),
        (Commands::Run(args), Some(config)) => commands::run::run(args, config).await,
        (Commands::Up(args), Some(config)) => commands::up::run(args, config).await,
        (Commands::Config(args), Some(config)) => commands::print_config::run(args, &config),
        (_, None) => Ok(())
    }
}
