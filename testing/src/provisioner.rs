//! Container provisioning.
//!
//! A [`Provisioner`] hands out a [`DatabaseHandle`]: a connection URL plus a
//! release operation that can run at most once, because it consumes the
//! handle.

use async_trait::async_trait;
use config::DatabaseConfig;
use errors::{ProvisionError, ReleaseError};
use sqlx::{Connection, PgConnection};
use std::fmt;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::time::Instant;

const POSTGRES_PORT: u16 = 5432;
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Stops and removes whatever backs a [`DatabaseHandle`].
#[async_trait]
pub trait Release: Send + Sync {
    async fn release(self: Box<Self>) -> Result<(), ReleaseError>;
}

/// A live database: where to connect, and how to get rid of it.
pub struct DatabaseHandle {
    url: String,
    release: Box<dyn Release>
}

impl DatabaseHandle {
    pub fn new(url: impl Into<String>, release: impl Release + 'static) -> Self {
        Self {
            url: url.into(),
            release: Box::new(release)
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn release(self) -> Result<(), ReleaseError> {
        self.release.release().await
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Acquires isolated database instances.
///
/// `provision` only returns once the instance accepts connections. On error
/// nothing may be left running.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Engine name used in progress logs.
    fn engine(&self) -> &str;

    async fn provision(&self) -> Result<DatabaseHandle, ProvisionError>;
}

/// Starts a pinned PostgreSQL image through testcontainers.
pub struct PostgresProvisioner {
    config: DatabaseConfig
}

impl PostgresProvisioner {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn connection_url(&self, host: &str, port: u16) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        )
    }
}

#[async_trait]
impl Provisioner for PostgresProvisioner {
    fn engine(&self) -> &str {
        "postgres"
    }

    async fn provision(&self) -> Result<DatabaseHandle, ProvisionError> {
        let deadline = Instant::now() + self.config.startup_timeout();
        let image = self.config.image_ref();

        // A start that times out drops its container inside testcontainers,
        // so only the post-start steps below need explicit cleanup.
        let container = Postgres::default()
            .with_db_name(&self.config.database)
            .with_user(&self.config.username)
            .with_password(&self.config.password)
            .with_name(self.config.image.as_str())
            .with_tag(self.config.tag.as_str())
            .with_startup_timeout(self.config.startup_timeout())
            .start()
            .await
            .map_err(|e| ProvisionError::Start {
                image: image.clone(),
                reason: e.to_string()
            })?;

        let endpoint = match resolve_endpoint(&container).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                discard(container).await;
                return Err(e);
            }
        };
        let url = self.connection_url(&endpoint.0, endpoint.1);

        if let Err(e) = wait_until_ready(&url, &endpoint, deadline).await {
            discard(container).await;
            return Err(e);
        }

        tracing::info!(
            "PostgreSQL {} ready on {}:{} (container {})",
            image,
            endpoint.0,
            endpoint.1,
            container.id()
        );

        Ok(DatabaseHandle::new(url, ContainerRelease { container }))
    }
}

async fn resolve_endpoint(
    container: &ContainerAsync<Postgres>,
) -> Result<(String, u16), ProvisionError> {
    let host = container
        .get_host()
        .await
        .map_err(|e| ProvisionError::Port {
            port: POSTGRES_PORT,
            reason: e.to_string()
        })?;
    let port = container
        .get_host_port_ipv4(POSTGRES_PORT)
        .await
        .map_err(|e| ProvisionError::Port {
            port: POSTGRES_PORT,
            reason: e.to_string()
        })?;
    Ok((host.to_string(), port))
}

async fn wait_until_ready(
    url: &str,
    endpoint: &(String, u16),
    deadline: Instant,
) -> Result<(), ProvisionError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let reason = match tokio::time::timeout(remaining, ping(url)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "readiness check timed out".to_string()
        };

        if Instant::now() + POLL_INTERVAL >= deadline {
            return Err(ProvisionError::Unreachable {
                endpoint: format!("{}:{}", endpoint.0, endpoint.1),
                attempts,
                reason
            });
        }

        tracing::debug!(
            "PostgreSQL not ready yet (attempt {}): {}",
            attempts,
            reason
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn ping(url: &str) -> Result<(), sqlx::Error> {
    let mut conn = PgConnection::connect(url).await?;
    conn.ping().await?;
    conn.close().await
}

async fn discard(container: ContainerAsync<Postgres>) {
    let id = container.id().to_string();
    if let Err(e) = container.rm().await {
        tracing::warn!("Failed to remove container {} after failed start: {:?}", id, e);
    }
}

struct ContainerRelease {
    container: ContainerAsync<Postgres>
}

#[async_trait]
impl Release for ContainerRelease {
    async fn release(self: Box<Self>) -> Result<(), ReleaseError> {
        let ContainerRelease { container } = *self;
        let container_id = container.id().to_string();

        container.stop().await.map_err(|e| ReleaseError::Stop {
            container_id: container_id.clone(),
            reason: e.to_string()
        })?;
        container.rm().await.map_err(|e| ReleaseError::Remove {
            container_id,
            reason: e.to_string()
        })
    }
}
