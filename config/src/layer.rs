//! # Configuration Layers
//!
//! A layer is the partial configuration one source actually set. `None`
//! means "not set here"; `Some` always wins over lower layers during the
//! merge, even when it equals the built-in default.

use serde::Deserialize;

/// Partial [`HarnessConfig`](crate::HarnessConfig) read from a file, the
/// environment or command-line flags.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigLayer {
    pub database: DatabaseLayer,
    pub migration: MigrationLayer,
    pub runner: RunnerLayer,
    pub observability: ObservabilityLayer
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseLayer {
    pub image: Option<String>,
    pub tag: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub startup_timeout_seconds: Option<u64>,
    pub url_env_var: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MigrationLayer {
    pub enabled: Option<bool>,
    pub command: Option<Vec<String>>
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerLayer {
    pub workers: Option<usize>
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityLayer {
    pub logging_level: Option<String>
}
