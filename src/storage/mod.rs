pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresEventStore;
pub use sqlite::SqliteEventStore;
pub use trait_def::{db_id, EventStore, StoreError, StoreResult};

use crate::config::{DatabaseBackend, DatabaseConfig};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Connect to the configured event store and create its schema.
///
/// Failure here is fatal: the process cannot record or report without a store.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn EventStore>> {
    let store: Arc<dyn EventStore> = match config.backend {
        DatabaseBackend::Sqlite => {
            tracing::info!("Using SQLite event store: {}", config.url);
            Arc::new(
                SqliteEventStore::new(&config.url, config.max_connections)
                    .await
                    .context("failed to connect to SQLite event store")?,
            )
        }
        DatabaseBackend::Postgres => {
            tracing::info!("Using PostgreSQL event store");
            Arc::new(
                PostgresEventStore::new(&config.url, config.max_connections)
                    .await
                    .context("failed to connect to PostgreSQL event store")?,
            )
        }
    };

    store
        .init()
        .await
        .context("failed to initialize event store schema")?;

    Ok(store)
}
