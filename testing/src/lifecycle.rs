//! Database lifecycle.
//!
//! `DatabaseLifecycle` owns the single database slot for a run. `start` is
//! the only path to provisioning and holds the slot lock across it, so
//! concurrent callers in one process see exactly one instance.

use crate::provisioner::{DatabaseHandle, PostgresProvisioner, Provisioner};
use config::DatabaseConfig;
use errors::{ProvisionError, ReleaseError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Extra time the lifecycle grants a container provisioner beyond its own
/// readiness deadline, so a failed start can remove its container before the
/// outer bound fires.
pub const CLEANUP_MARGIN: Duration = Duration::from_secs(30);

pub struct DatabaseLifecycle {
    provisioner: Arc<dyn Provisioner>,
    startup_timeout: Duration,
    slot: Mutex<Option<DatabaseHandle>>,
    provisioned: AtomicU64,
    released: AtomicU64
}

impl DatabaseLifecycle {
    pub fn new(provisioner: Arc<dyn Provisioner>, startup_timeout: Duration) -> Self {
        Self {
            provisioner,
            startup_timeout,
            slot: Mutex::new(None),
            provisioned: AtomicU64::new(0),
            released: AtomicU64::new(0)
        }
    }

    /// Lifecycle backed by a PostgreSQL container built from `config`. The
    /// provisioner enforces `startup_timeout_seconds` itself; the outer bound
    /// only catches a provisioner that hangs past its own cleanup.
    pub fn postgres(config: &DatabaseConfig) -> Self {
        Self::new(
            Arc::new(PostgresProvisioner::new(config.clone())),
            config.startup_timeout() + CLEANUP_MARGIN,
        )
    }

    /// Upper bound on a single `start()` provisioning call.
    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    /// Returns the URL of the live database, provisioning one if needed.
    pub async fn start(&self) -> Result<String, ProvisionError> {
        let mut slot = self.slot.lock().await;
        let engine = self.provisioner.engine();

        if let Some(handle) = slot.as_ref() {
            tracing::info!("Reusing existing {} container.", engine);
            return Ok(handle.url().to_string());
        }

        tracing::info!("Starting {}...", engine);
        // Timing out drops the in-flight provision future.
        let handle =
            match tokio::time::timeout(self.startup_timeout, self.provisioner.provision()).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(
                        "{} did not become ready within {:?}",
                        engine,
                        self.startup_timeout
                    );
                    return Err(ProvisionError::Timeout {
                        timeout: self.startup_timeout
                    });
                }
            };

        self.provisioned.fetch_add(1, Ordering::SeqCst);
        let url = handle.url().to_string();
        *slot = Some(handle);
        Ok(url)
    }

    /// Releases the live database, if any. The slot is empty afterwards even
    /// when the release itself fails.
    pub async fn stop(&self) -> Result<(), ReleaseError> {
        let mut slot = self.slot.lock().await;
        let Some(handle) = slot.take() else {
            return Ok(());
        };

        tracing::info!("Stopping {}...", self.provisioner.engine());
        self.released.fetch_add(1, Ordering::SeqCst);
        handle.release().await
    }

    pub async fn url(&self) -> Option<String> {
        self.slot.lock().await.as_ref().map(|h| h.url().to_string())
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Successful provisions so far.
    pub fn provision_count(&self) -> u64 {
        self.provisioned.load(Ordering::SeqCst)
    }

    /// Releases attempted so far.
    pub fn release_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}
