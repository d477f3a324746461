use crate::lifecycle::DatabaseLifecycle;
use config::{ConfigLayer, HarnessConfig};
use errors::ReleaseError;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::OnceCell;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

/// Schema-safe unique name, e.g. for a per-test `CREATE SCHEMA`.
pub fn unique_schema(prefix: &str) -> String {
    unique_id(prefix).replace('-', "_")
}

/// Process-wide database for plain `cargo test` suites, built from `DBH_*`
/// settings on first use. Migrations are not run here; tests apply whatever
/// schema they need.
///
/// Statics are never dropped, so the container outlives the tests unless
/// [`shutdown_shared_database`] is called. Call it once the suite is done.
static SHARED: OnceCell<DatabaseLifecycle> = OnceCell::const_new();

async fn shared_lifecycle() -> &'static DatabaseLifecycle {
    SHARED
        .get_or_init(|| async {
            let layer = config::load_from_env().unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid DBH_* settings: {}", e);
                ConfigLayer::default()
            });
            let config = config::merge_configs(
                HarnessConfig::default(),
                ConfigLayer::default(),
                "file",
                layer,
                "env",
                None,
                "cli",
            );
            DatabaseLifecycle::postgres(&config.database)
        })
        .await
}

/// URL of the shared database, starting it if needed. Returns `None` when it
/// cannot be started (e.g. no Docker), so callers can skip.
pub async fn shared_database() -> Option<String> {
    match shared_lifecycle().await.start().await {
        Ok(url) => {
            tracing::info!("Shared database fixture ready at {}", endpoint(&url));
            Some(url)
        }
        Err(e) => {
            tracing::warn!("Failed to start shared database: {:?}", e);
            None
        }
    }
}

/// The lifecycle behind [`shared_database`], once it has been used.
pub fn shared_lifecycle_if_started() -> Option<&'static DatabaseLifecycle> {
    SHARED.get()
}

/// Releases the shared database. A later [`shared_database`] call
/// provisions a fresh one.
pub async fn shutdown_shared_database() -> Result<(), ReleaseError> {
    match SHARED.get() {
        Some(lifecycle) => lifecycle.stop().await,
        None => Ok(())
    }
}

/// `host:port/database` part of a connection URL, without credentials.
fn endpoint(url: &str) -> &str {
    url.rsplit_once('@').map_or(url, |(_, rest)| rest)
}
