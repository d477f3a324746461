//! Setup/teardown phase gate.
//!
//! A [`PhasePlan`] names phases, their prerequisites and their teardown
//! phases. [`PhaseRunner`] enforces the ordering:
//!
//! - a phase starts only after every prerequisite finished, and is skipped
//!   unless all of them passed;
//! - a teardown phase starts after its owner and every phase that depends on
//!   the owner finished, whatever their outcome, and runs exactly once;
//! - units inside a phase run concurrently, bounded by the worker count.

use crate::env::SharedEnv;
use async_trait::async_trait;
use errors::GateError;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;

pub type UnitError = Box<dyn std::error::Error + Send + Sync>;

/// One schedulable piece of work inside a phase.
#[async_trait]
pub trait TestUnit: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, env: &SharedEnv) -> Result<(), UnitError>;
}

#[derive(Clone)]
pub struct Phase {
    name: String,
    dependencies: Vec<String>,
    teardown: Option<String>,
    units: Vec<Arc<dyn TestUnit>>
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            teardown: None,
            units: Vec::new()
        }
    }

    pub fn depends_on(mut self, phase: impl Into<String>) -> Self {
        self.dependencies.push(phase.into());
        self
    }

    /// Declares `phase` as the teardown hook of this phase.
    pub fn with_teardown(mut self, phase: impl Into<String>) -> Self {
        self.teardown = Some(phase.into());
        self
    }

    pub fn with_unit(self, unit: impl TestUnit + 'static) -> Self {
        self.with_shared_unit(Arc::new(unit))
    }

    pub fn with_shared_unit(mut self, unit: Arc<dyn TestUnit>) -> Self {
        self.units.push(unit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn teardown(&self) -> Option<&str> {
        self.teardown.as_deref()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("teardown", &self.teardown)
            .field("units", &self.units.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhasePlan {
    phases: Vec<Phase>
}

/// Resolved wait edges: phase -> phases it must see finished first.
struct Schedule {
    waits: HashMap<String, BTreeSet<String>>,
    owners: HashMap<String, String>
}

impl PhasePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn validate(&self) -> Result<(), GateError> {
        self.schedule().map(|_| ())
    }

    fn schedule(&self) -> Result<Schedule, GateError> {
        let mut names = BTreeSet::new();
        for phase in &self.phases {
            if !names.insert(phase.name.as_str()) {
                return Err(GateError::DuplicatePhase {
                    phase: phase.name.clone()
                });
            }
        }

        let mut waits: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for phase in &self.phases {
            for dep in &phase.dependencies {
                if !names.contains(dep.as_str()) {
                    return Err(GateError::UnknownDependency {
                        phase: phase.name.clone(),
                        dependency: dep.clone()
                    });
                }
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(phase.name.as_str());
            }
            waits.insert(
                phase.name.clone(),
                phase.dependencies.iter().cloned().collect(),
            );

            if let Some(teardown) = &phase.teardown {
                if !names.contains(teardown.as_str()) {
                    return Err(GateError::UnknownTeardown {
                        phase: phase.name.clone(),
                        teardown: teardown.clone()
                    });
                }
                if let Some(first) = owners.get(teardown) {
                    return Err(GateError::SharedTeardown {
                        teardown: teardown.clone(),
                        first: first.clone(),
                        second: phase.name.clone()
                    });
                }
                owners.insert(teardown.clone(), phase.name.clone());
            }
        }

        for (teardown, owner) in &owners {
            let mut gate = BTreeSet::from([owner.clone()]);
            let mut queue = VecDeque::from([owner.as_str()]);
            while let Some(current) = queue.pop_front() {
                for next in dependents.get(current).into_iter().flatten() {
                    if gate.insert((*next).to_string()) {
                        queue.push_back(*next);
                    }
                }
            }
            gate.remove(teardown);
            waits.entry(teardown.clone()).or_default().extend(gate);
        }

        check_acyclic(&waits)?;
        Ok(Schedule { waits, owners })
    }
}

fn check_acyclic(waits: &HashMap<String, BTreeSet<String>>) -> Result<(), GateError> {
    let mut pending: BTreeMap<&str, usize> = waits
        .iter()
        .map(|(name, deps)| (name.as_str(), deps.len()))
        .collect();
    let mut ready: VecDeque<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();

    while let Some(done) = ready.pop_front() {
        pending.remove(done);
        for (name, deps) in waits {
            if deps.contains(done) {
                if let Some(count) = pending.get_mut(name.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(name);
                    }
                }
            }
        }
    }

    match pending.keys().next() {
        Some(phase) => Err(GateError::Cycle {
            phase: (*phase).to_string()
        }),
        None => Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Passed,
    Failed { failures: Vec<String> },
    Skipped { reason: String }
}

impl PhaseOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, PhaseOutcome::Passed)
    }

    pub fn ran(&self) -> bool {
        !matches!(self, PhaseOutcome::Skipped { .. })
    }
}

/// Start/finish instants of one unit execution.
#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub phase: String,
    pub unit: String,
    pub started: Instant,
    pub finished: Instant,
    pub error: Option<String>
}

#[derive(Debug, Default)]
pub struct RunReport {
    outcomes: BTreeMap<String, PhaseOutcome>,
    units: Vec<UnitRecord>,
    teardowns: BTreeSet<String>
}

impl RunReport {
    pub fn outcome(&self, phase: &str) -> Option<&PhaseOutcome> {
        self.outcomes.get(phase)
    }

    pub fn units(&self) -> &[UnitRecord] {
        &self.units
    }

    pub fn units_of<'a>(&'a self, phase: &'a str) -> impl Iterator<Item = &'a UnitRecord> {
        self.units.iter().filter(move |u| u.phase == phase)
    }

    /// True when every non-teardown phase passed. Teardown failures are
    /// reported separately and do not change the verdict.
    pub fn passed(&self) -> bool {
        self.outcomes
            .iter()
            .filter(|(name, _)| !self.teardowns.contains(*name))
            .all(|(_, outcome)| outcome.is_passed())
    }

    pub fn teardown_failures(&self) -> Vec<&str> {
        self.teardowns
            .iter()
            .filter(|name| {
                matches!(
                    self.outcomes.get(name.as_str()),
                    Some(PhaseOutcome::Failed { .. })
                )
            })
            .map(String::as_str)
            .collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcome) in &self.outcomes {
            let units = self.units_of(name).count();
            match outcome {
                PhaseOutcome::Passed => writeln!(f, "  passed   {} ({} units)", name, units)?,
                PhaseOutcome::Failed { failures } => {
                    writeln!(f, "  failed   {} ({} units)", name, units)?;
                    for failure in failures {
                        writeln!(f, "           - {}", failure)?;
                    }
                }
                PhaseOutcome::Skipped { reason } => {
                    writeln!(f, "  skipped  {} ({})", name, reason)?
                }
            }
        }
        Ok(())
    }
}

type Done = watch::Receiver<Option<PhaseOutcome>>;

pub struct PhaseRunner {
    workers: usize,
    env: SharedEnv
}

impl PhaseRunner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            env: SharedEnv::new()
        }
    }

    pub fn with_env(mut self, env: SharedEnv) -> Self {
        self.env = env;
        self
    }

    pub fn env(&self) -> &SharedEnv {
        &self.env
    }

    pub async fn run(&self, plan: PhasePlan) -> Result<RunReport, GateError> {
        if self.workers == 0 {
            return Err(GateError::NoWorkers);
        }
        let schedule = plan.schedule()?;
        let permits = Arc::new(Semaphore::new(self.workers));

        let mut senders = HashMap::new();
        let mut receivers: HashMap<String, Done> = HashMap::new();
        for phase in &plan.phases {
            let (tx, rx) = watch::channel(None);
            senders.insert(phase.name.clone(), tx);
            receivers.insert(phase.name.clone(), rx);
        }

        let mut tasks = JoinSet::new();
        for phase in plan.phases {
            let Some(done) = senders.remove(&phase.name) else {
                continue;
            };
            let waits: Vec<(String, Done)> = schedule
                .waits
                .get(&phase.name)
                .into_iter()
                .flatten()
                .filter_map(|name| receivers.get(name).map(|rx| (name.clone(), rx.clone())))
                .collect();
            let owner = schedule.owners.get(&phase.name).cloned();

            tasks.spawn(run_phase(
                phase,
                waits,
                owner,
                done,
                permits.clone(),
                self.env.clone(),
            ));
        }

        let mut report = RunReport {
            teardowns: schedule.owners.keys().cloned().collect(),
            ..Default::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome, records)) => {
                    report.outcomes.insert(name, outcome);
                    report.units.extend(records);
                }
                Err(e) => tracing::error!("Phase task aborted: {}", e)
            }
        }
        report.units.sort_by_key(|u| u.started);

        Ok(report)
    }
}

async fn run_phase(
    phase: Phase,
    waits: Vec<(String, Done)>,
    owner: Option<String>,
    done: watch::Sender<Option<PhaseOutcome>>,
    permits: Arc<Semaphore>,
    env: SharedEnv,
) -> (String, PhaseOutcome, Vec<UnitRecord>) {
    let mut settled = BTreeMap::new();
    for (name, mut rx) in waits {
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(PhaseOutcome::Skipped {
                reason: "no outcome".to_string()
            }),
            Err(_) => PhaseOutcome::Failed {
                failures: vec![format!("phase {} aborted", name)]
            }
        };
        settled.insert(name, outcome);
    }

    let blocked = match &owner {
        Some(owner) => settled
            .get(owner)
            .filter(|outcome| !outcome.ran())
            .map(|_| format!("{} never ran", owner)),
        None => settled
            .iter()
            .find(|(_, outcome)| !outcome.is_passed())
            .map(|(name, _)| format!("prerequisite {} did not pass", name))
    };

    if let Some(reason) = blocked {
        tracing::info!("Skipping phase {}: {}", phase.name, reason);
        let outcome = PhaseOutcome::Skipped { reason };
        done.send_replace(Some(outcome.clone()));
        return (phase.name, outcome, Vec::new());
    }

    tracing::info!("Running phase {} ({} units)", phase.name, phase.units.len());
    let records = run_units(&phase, &permits, &env).await;

    let failures: Vec<String> = records
        .iter()
        .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.unit, e)))
        .collect();
    let outcome = if failures.is_empty() {
        PhaseOutcome::Passed
    } else {
        for failure in &failures {
            if owner.is_some() {
                tracing::warn!("Teardown {} failed: {}", phase.name, failure);
            } else {
                tracing::error!("Phase {} failed: {}", phase.name, failure);
            }
        }
        PhaseOutcome::Failed { failures }
    };

    done.send_replace(Some(outcome.clone()));
    (phase.name, outcome, records)
}

async fn run_units(phase: &Phase, permits: &Arc<Semaphore>, env: &SharedEnv) -> Vec<UnitRecord> {
    let mut set = JoinSet::new();
    let mut names = HashMap::new();

    for unit in &phase.units {
        let unit = unit.clone();
        let permits = permits.clone();
        let env = env.clone();
        let phase_name = phase.name.clone();
        let unit_name = unit.name().to_string();

        let handle = set.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let started = Instant::now();
            let result = unit.run(&env).await;
            UnitRecord {
                phase: phase_name,
                unit: unit.name().to_string(),
                started,
                finished: Instant::now(),
                error: result.err().map(|e| e.to_string())
            }
        });
        names.insert(handle.id(), unit_name);
    }

    let mut records = Vec::with_capacity(phase.units.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(record) => records.push(record),
            Err(e) => {
                let now = Instant::now();
                records.push(UnitRecord {
                    phase: phase.name.clone(),
                    unit: names.get(&e.id()).cloned().unwrap_or_default(),
                    started: now,
                    finished: now,
                    error: Some(format!("unit panicked: {}", e))
                });
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str);

    #[async_trait]
    impl TestUnit for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _env: &SharedEnv) -> Result<(), UnitError> {
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_phase_rejected() {
        let plan = PhasePlan::new()
            .with_phase(Phase::new("setup"))
            .with_phase(Phase::new("setup"));
        assert!(matches!(
            plan.validate(),
            Err(GateError::DuplicatePhase { phase }) if phase == "setup"
        ));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let plan = PhasePlan::new().with_phase(Phase::new("chromium").depends_on("setup"));
        assert!(matches!(
            plan.validate(),
            Err(GateError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_teardown_rejected() {
        let plan = PhasePlan::new().with_phase(Phase::new("setup").with_teardown("teardown"));
        assert!(matches!(plan.validate(), Err(GateError::UnknownTeardown { .. })));
    }

    #[test]
    fn test_shared_teardown_rejected() {
        let plan = PhasePlan::new()
            .with_phase(Phase::new("a").with_teardown("t"))
            .with_phase(Phase::new("b").with_teardown("t"))
            .with_phase(Phase::new("t"));
        assert!(matches!(plan.validate(), Err(GateError::SharedTeardown { .. })));
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let plan = PhasePlan::new()
            .with_phase(Phase::new("a").depends_on("b"))
            .with_phase(Phase::new("b").depends_on("a"));
        assert!(matches!(plan.validate(), Err(GateError::Cycle { .. })));
    }

    #[test]
    fn test_teardown_depended_on_by_dependent_is_cycle() {
        let plan = PhasePlan::new()
            .with_phase(Phase::new("setup").with_teardown("teardown"))
            .with_phase(Phase::new("teardown"))
            .with_phase(Phase::new("worker").depends_on("setup").depends_on("teardown"));
        assert!(matches!(plan.validate(), Err(GateError::Cycle { .. })));
    }

    #[test]
    fn test_teardown_waits_on_transitive_dependents() {
        let plan = PhasePlan::new()
            .with_phase(Phase::new("setup").with_teardown("teardown"))
            .with_phase(Phase::new("teardown"))
            .with_phase(Phase::new("seed").depends_on("setup"))
            .with_phase(Phase::new("worker").depends_on("seed"))
            .with_phase(Phase::new("unrelated"));

        let schedule = plan.schedule().unwrap();
        let gate: Vec<&str> = schedule.waits["teardown"]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(gate, vec!["seed", "setup", "worker"]);
        assert_eq!(schedule.owners["teardown"], "setup");
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let result = PhaseRunner::new(0).run(PhasePlan::new()).await;
        assert!(matches!(result, Err(GateError::NoWorkers)));
    }

    #[tokio::test]
    async fn test_empty_phase_passes() {
        let report = PhaseRunner::new(1)
            .run(PhasePlan::new().with_phase(Phase::new("empty")))
            .await
            .unwrap();
        assert_eq!(report.outcome("empty"), Some(&PhaseOutcome::Passed));
        assert!(report.passed());
    }

    #[tokio::test]
    async fn test_report_display_lists_phases() {
        let report = PhaseRunner::new(2)
            .run(
                PhasePlan::new()
                    .with_phase(Phase::new("setup").with_unit(Noop("start")))
                    .with_phase(Phase::new("worker").depends_on("setup").with_unit(Noop("a"))),
            )
            .await
            .unwrap();

        let rendered = report.to_string();
        assert!(rendered.contains("passed   setup (1 units)"));
        assert!(rendered.contains("passed   worker (1 units)"));
    }
}
