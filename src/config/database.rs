use crate::config::dashboard::DashboardConfig;
use crate::migration::Migrator;
use crate::store::{MemoryStore, PgDocumentStore, SharedStore};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl StoreBackend {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw = env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string());
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(anyhow::anyhow!(
                "Unknown STORE_BACKEND '{}', expected memory or postgres",
                other
            )),
        }
    }
}

pub async fn get_database() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| DbErr::Custom("DATABASE_URL must be set".to_string()))?;

    let max_connections: u32 = super::parse_env("DB_MAX_CONNECTIONS", 10);
    let min_connections: u32 = super::parse_env("DB_MIN_CONNECTIONS", 2);

    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    Database::connect(opt).await
}

/// Open the configured document store, applying migrations for Postgres.
pub async fn connect_store(
    backend: StoreBackend,
    dashboard: &DashboardConfig,
) -> anyhow::Result<SharedStore> {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory document store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let db = get_database().await?;
            tracing::info!("Database connected successfully");

            Migrator::up(&db, None).await?;
            tracing::info!("Database migrations applied successfully");

            Ok(Arc::new(PgDocumentStore::new(
                db,
                dashboard.count_poll_interval,
            )))
        }
    }
}
