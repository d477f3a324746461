pub mod completion;
pub mod print_config;
pub mod run;
pub mod settings;
pub mod up;

use clap::{Parser, Subcommand};
use config::ConfigLayer;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dbharness",
    author,
    version,
    about = "Run test suites against an ephemeral PostgreSQL database",
    long_about = "Starts a disposable PostgreSQL container, applies migrations, runs your test \
                  commands with DATABASE_URL set, then tears the container down.\n\nSettings \
                  come from --config, DBH_* environment variables and flags, in increasing \
                  priority."
)]
pub struct Cli {
    #[arg(long, global = true, help = "Configuration file (.toml, .yaml or .yml)")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Set up a database, run test commands against it, tear it down")]
    Run(run::RunArgs),

    #[command(about = "Start a database and keep it running until Ctrl-C")]
    Up(up::UpArgs),

    #[command(about = "Print the effective configuration")]
    Config(print_config::PrintConfigArgs),

    #[command(about = "Generate shell completions")]
    Completion(completion::CompletionArgs)
}

impl Commands {
    /// Settings given as flags, layered over file and environment.
    pub fn overrides(&self) -> ConfigLayer {
        match self {
            Commands::Run(args) => args.overrides(),
            Commands::Up(args) => args.overrides(),
            Commands::Config(_) | Commands::Completion(_) => ConfigLayer::default()
        }
    }
}
