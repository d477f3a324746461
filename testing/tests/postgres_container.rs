//! Integration tests against a real PostgreSQL container.
//!
//! These tests use testcontainers and are skipped when Docker is not
//! available.

use config::DatabaseConfig;
use sqlx::{Connection, PgConnection};
use testing::{
    DatabaseLifecycle, PostgresProvisioner, Provisioner, shared_database,
    shared_lifecycle_if_started, shutdown_shared_database,
};

fn small_config() -> DatabaseConfig {
    DatabaseConfig {
        database: "testdb".to_string(),
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        startup_timeout_seconds: 120,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_provisioned_database_accepts_connections() {
    let provisioner = PostgresProvisioner::new(small_config());
    let handle = match provisioner.provision().await {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Skipping PostgreSQL test: Docker not available ({})", e);
            return;
        }
    };

    assert!(handle.url().starts_with("postgres://testuser:testpass@"));
    assert!(handle.url().ends_with("/testdb"));

    let mut conn = PgConnection::connect(handle.url()).await.unwrap();
    conn.ping().await.unwrap();
    conn.close().await.unwrap();

    let url = handle.url().to_string();
    handle.release().await.unwrap();
    assert!(PgConnection::connect(&url).await.is_err());
}

#[tokio::test]
async fn test_lifecycle_restart_yields_new_container() {
    let lifecycle = DatabaseLifecycle::postgres(&small_config());

    let u1 = match lifecycle.start().await {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Skipping PostgreSQL test: Docker not available ({})", e);
            return;
        }
    };
    assert_eq!(lifecycle.start().await.unwrap(), u1);

    lifecycle.stop().await.unwrap();
    let u2 = lifecycle.start().await.unwrap();
    assert_ne!(u1, u2);
    assert_eq!(lifecycle.provision_count(), 2);

    lifecycle.stop().await.unwrap();
    assert!(!lifecycle.is_running().await);
}

#[tokio::test]
async fn test_shared_database_is_reused_and_released() {
    let Some(first) = shared_database().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let second = shared_database().await.unwrap();
    let lifecycle = shared_lifecycle_if_started().unwrap();

    assert_eq!(first, second);
    assert_eq!(lifecycle.provision_count(), 1);

    shutdown_shared_database().await.unwrap();
    assert!(!lifecycle.is_running().await);
    assert_eq!(lifecycle.release_count(), 1);
    assert!(PgConnection::connect(&first).await.is_err());
}
