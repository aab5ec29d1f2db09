//! Shared helpers for integration tests.

#![allow(dead_code)]

use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use taskwing::domain::models::{Plan, Task};
use taskwing::infrastructure::database::DatabaseConnection;

/// Open a migrated database in a fresh temp directory. The directory
/// guard must stay alive for the duration of the test.
pub async fn setup_test_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("taskwing-test.db");
    let url = format!("sqlite:{}", path.display());

    let db = DatabaseConnection::new(&url, 5)
        .await
        .expect("failed to open test database");
    db.migrate().await.expect("failed to run migrations");

    (db.pool().clone(), dir)
}

pub fn sample_plan(goal: &str) -> Plan {
    Plan::new(goal)
}

pub fn sample_task(plan_id: Uuid, title: &str) -> Task {
    Task::new(plan_id, title, "integration test task description")
}
