//! # Configuration System
//!
//! Configuration for the ephemeral test-database harness.
//!
//! This crate provides:
//! - Configuration structures (`HarnessConfig` and its sections)
//! - Partial per-source layers (`ConfigLayer`)
//! - Environment variable loading (`DBH_*`)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (CLI > env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod layer;
pub mod loader;
pub mod precedence;
pub mod validation;

pub use config::{
    DatabaseConfig, HarnessConfig, MigrationConfig, ObservabilityConfig, RunnerConfig,
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use layer::{ConfigLayer, DatabaseLayer, MigrationLayer, ObservabilityLayer, RunnerLayer};
pub use loader::{EnvError, load_from_env};
pub use precedence::merge_configs;
pub use validation::validate;
