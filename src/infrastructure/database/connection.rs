//! Database connection pool manager.
//!
//! Manages the SQLite connection pool with WAL mode enabled for better
//! concurrency. Handles connection lifecycle, migrations, and pragmas.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use super::errors::DatabaseError;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a new connection pool with WAL mode enabled.
    ///
    /// # Configuration
    /// - Journal mode: WAL (Write-Ahead Logging)
    /// - Synchronous: NORMAL
    /// - Foreign keys: enabled
    /// - Busy timeout: 5 seconds
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!("Invalid database URL: {e}"))
            })?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections.max(1))
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Run migrations at startup. Safe to call multiple times.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_pool_creation() {
        let db = DatabaseConnection::new("sqlite::memory:", 1)
            .await
            .expect("failed to create database connection");

        assert!(!db.pool().is_closed());
        db.close().await;
    }

    #[tokio::test]
    async fn test_migration_runs_successfully() {
        let db = DatabaseConnection::new("sqlite::memory:", 1)
            .await
            .expect("failed to create database connection");

        db.migrate().await.expect("failed to run migrations");

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='plans'",
        )
        .fetch_one(db.pool())
        .await
        .expect("failed to query table");

        assert_eq!(result.0, 1, "plans table should exist");

        db.close().await;
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = DatabaseConnection::new("sqlite::memory:", 1)
            .await
            .expect("failed to create database connection");

        let result: (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .expect("failed to check foreign keys pragma");

        assert_eq!(result.0, 1, "foreign keys should be enabled");

        db.close().await;
    }
}
