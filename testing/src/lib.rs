//! Ephemeral test databases for parallel test runs.
//!
//! - `provisioner`: starts a disposable, version-pinned PostgreSQL container
//!   and waits until it accepts connections
//! - `lifecycle`: owns at most one live database per run, with idempotent
//!   start/stop
//! - `schema`: runs the external migration command against it
//! - `phase`: orders setup, dependent units and teardown
//! - `units`: the database setup/teardown units and external commands
//!
//! `fixtures` keeps the lazily initialized, process-wide database for plain
//! `cargo test` suites; `shutdown_shared_database` releases it.

mod fixtures;

pub mod env;
pub mod lifecycle;
pub mod phase;
pub mod provisioner;
pub mod schema;
pub mod units;

pub use env::SharedEnv;
pub use fixtures::*;
pub use lifecycle::DatabaseLifecycle;
pub use phase::{Phase, PhaseOutcome, PhasePlan, PhaseRunner, RunReport, TestUnit, UnitError};
pub use provisioner::{DatabaseHandle, PostgresProvisioner, Provisioner, Release};
pub use schema::SchemaMaterializer;
pub use units::{
    CommandUnit, SETUP_PHASE, SetupFailure, StartDatabase, StopDatabase, TEARDOWN_PHASE,
    database_phases, database_phases_with_failure,
};
