use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::config::Config;
use crate::events::EventStreams;
use crate::migrator::Migrator;
use crate::services::assertion::AssertionEngine;
use crate::services::http_client::HttpClient;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// SeaORM connection pool
    pub db: DatabaseConnection,
    pub config: Config,
    /// Pub/sub fabric behind the sync endpoints
    pub streams: Arc<EventStreams>,
    /// Outbound client used by runs
    pub http_client: HttpClient,
    pub assertions: AssertionEngine,
}

impl AppState {
    /// Connect to the database, apply migrations and build the shared services
    pub async fn new(config: Config) -> Result<Self, AppStateError> {
        let db = connect(&config.database_url).await?;

        Migrator::up(&db, None)
            .await
            .map_err(|e| AppStateError::Migration(e.to_string()))?;

        Self::with_connection(config, db)
    }

    /// Build state around an existing, already migrated connection
    pub fn with_connection(config: Config, db: DatabaseConnection) -> Result<Self, AppStateError> {
        let http_client =
            HttpClient::new(&config).map_err(|e| AppStateError::HttpClient(e.to_string()))?;
        let streams = Arc::new(EventStreams::new(config.event_buffer_size));

        Ok(Self {
            db,
            config,
            streams,
            http_client,
            assertions: AssertionEngine::default(),
        })
    }
}

/// Open the connection pool. In-memory SQLite lives inside a single
/// connection, so the pool is pinned to exactly one.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, AppStateError> {
    let mut opt = ConnectOptions::new(database_url);
    if database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory") {
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(100).min_connections(5);
    }
    opt.sqlx_logging(false);

    Database::connect(opt)
        .await
        .map_err(|e| AppStateError::Database(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("Database connection error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
