mod error;
pub mod repos;
pub mod sqlite;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::{config::DatabaseConfig, lifecycle::Lifecycle};

/// SQLite-backed store with its repositories created once at startup.
pub struct DbPool {
    pool: sqlx::SqlitePool,
    polls: Arc<dyn PollRepo>,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    pub fn from_sqlite(pool: sqlx::SqlitePool, lifecycle: Lifecycle) -> Self {
        let polls = Arc::new(sqlite::SqlitePollRepo::new(pool.clone(), lifecycle));
        DbPool { pool, polls }
    }

    /// Create a database pool from configuration
    pub async fn from_config(config: &DatabaseConfig, lifecycle: Lifecycle) -> DbResult<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(&config.path)
                    .create_if_missing(config.create_if_missing)
                    .journal_mode(if config.wal_mode {
                        sqlx::sqlite::SqliteJournalMode::Wal
                    } else {
                        sqlx::sqlite::SqliteJournalMode::Delete
                    })
                    .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms)),
            )
            .await?;

        let db = Self::from_sqlite(pool, lifecycle);

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> DbResult<()> {
        tracing::info!("Running SQLite migrations");
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        tracing::info!("SQLite migrations completed successfully");
        Ok(())
    }

    /// Get poll repository
    pub fn polls(&self) -> Arc<dyn PollRepo> {
        Arc::clone(&self.polls)
    }

    /// Borrow the underlying pool for store-specific operations.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Close all connections, waiting for in-flight queries to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
