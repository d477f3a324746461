//! Run-scoped environment channel.
//!
//! Setup publishes the connection URL here; dependent units read it. Cloning
//! a `SharedEnv` shares the same underlying map.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct SharedEnv {
    vars: Arc<RwLock<BTreeMap<String, String>>>
}

impl SharedEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.read().get(key).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars.read().clone()
    }

    /// Exports every published variable to a child process.
    pub fn apply_to(&self, command: &mut Command) {
        for (key, value) in self.vars.read().iter() {
            command.env(key, value);
        }
    }
}
