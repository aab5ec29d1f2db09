//! SQLite implementation of the task repository.
//!
//! `claim` is implemented as a single conditional UPDATE so that
//! concurrent sessions racing for the same task are serialised by the
//! database; exactly one write takes effect.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ContextNode, Task, TaskStatus};
use crate::domain::ports::TaskRepository;
use crate::infrastructure::database::utils::{decode_json, encode_json, parse_datetime};

/// SQLite implementation of `TaskRepository` using sqlx.
pub struct TaskRepositoryImpl {
    pool: SqlitePool,
}

impl TaskRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &SqliteRow) -> DomainResult<Task> {
        let status: String = row.get("status");
        Ok(Task {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            plan_id: Uuid::parse_str(row.get::<String, _>("plan_id").as_str())?,
            phase_id: row
                .get::<Option<String>, _>("phase_id")
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()?,
            title: row.get("title"),
            description: row.get("description"),
            status: status.parse()?,
            priority: u8::try_from(row.get::<i64, _>("priority").clamp(0, 100))
                .unwrap_or_default(),
            scope: row.get("scope"),
            keywords: decode_json(row.get("keywords"))?,
            suggested_recall_queries: decode_json(row.get("suggested_recall_queries"))?,
            context_summary: row.get("context_summary"),
            acceptance_criteria: decode_json(row.get("acceptance_criteria"))?,
            validation_steps: decode_json(row.get("validation_steps"))?,
            expected_files: decode_json(row.get("expected_files"))?,
            git_baseline: decode_json(row.get("git_baseline"))?,
            files_modified: decode_json(row.get("files_modified"))?,
            completion_summary: row.get("completion_summary"),
            claimed_by: row.get("claimed_by"),
            claimed_at: row
                .get::<Option<String>, _>("claimed_at")
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            completed_at: row
                .get::<Option<String>, _>("completed_at")
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            dependencies: decode_json::<Vec<Uuid>>(row.get("dependencies"))?,
            context_nodes: decode_json::<Vec<ContextNode>>(row.get("context_nodes"))?,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }

    async fn fetch(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_task).transpose()
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        sqlx::query(
            r"
            INSERT INTO tasks (
                id, plan_id, phase_id, title, description, status, priority,
                scope, keywords, suggested_recall_queries, context_summary,
                acceptance_criteria, validation_steps, expected_files,
                git_baseline, files_modified, completion_summary,
                claimed_by, claimed_at, completed_at, dependencies,
                context_nodes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(task.id.to_string())
        .bind(task.plan_id.to_string())
        .bind(task.phase_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(i64::from(task.priority))
        .bind(&task.scope)
        .bind(encode_json(&task.keywords)?)
        .bind(encode_json(&task.suggested_recall_queries)?)
        .bind(&task.context_summary)
        .bind(encode_json(&task.acceptance_criteria)?)
        .bind(encode_json(&task.validation_steps)?)
        .bind(encode_json(&task.expected_files)?)
        .bind(if task.git_baseline.is_empty() {
            None
        } else {
            Some(encode_json(&task.git_baseline)?)
        })
        .bind(encode_json(&task.files_modified)?)
        .bind(&task.completion_summary)
        .bind(task.claimed_by.as_deref())
        .bind(task.claimed_at.map(|dt| dt.to_rfc3339()))
        .bind(task.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(encode_json(&task.dependencies)?)
        .bind(encode_json(&task.context_nodes)?)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        self.fetch(id).await
    }

    async fn list_by_plan(&self, plan_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE plan_id = ? ORDER BY created_at, id")
            .bind(plan_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let result = sqlx::query(
            r"
            UPDATE tasks SET
                phase_id = ?, title = ?, description = ?, status = ?,
                priority = ?, scope = ?, keywords = ?,
                suggested_recall_queries = ?, context_summary = ?,
                acceptance_criteria = ?, validation_steps = ?,
                expected_files = ?, files_modified = ?,
                completion_summary = ?, claimed_by = ?, claimed_at = ?,
                completed_at = ?, dependencies = ?, context_nodes = ?,
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(task.phase_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(i64::from(task.priority))
        .bind(&task.scope)
        .bind(encode_json(&task.keywords)?)
        .bind(encode_json(&task.suggested_recall_queries)?)
        .bind(&task.context_summary)
        .bind(encode_json(&task.acceptance_criteria)?)
        .bind(encode_json(&task.validation_steps)?)
        .bind(encode_json(&task.expected_files)?)
        .bind(encode_json(&task.files_modified)?)
        .bind(&task.completion_summary)
        .bind(task.claimed_by.as_deref())
        .bind(task.claimed_at.map(|dt| dt.to_rfc3339()))
        .bind(task.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(encode_json(&task.dependencies)?)
        .bind(encode_json(&task.context_nodes)?)
        .bind(Utc::now().to_rfc3339())
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> DomainResult<()> {
        let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }
        Ok(())
    }

    async fn claim(&self, id: Uuid, session_id: &str) -> DomainResult<Task> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET status = 'in_progress', claimed_by = ?, claimed_at = ?, updated_at = ?
            WHERE id = ? AND status IN ('pending', 'ready')
            ",
        )
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.fetch(id).await? {
                Some(_) => Err(DomainError::AlreadyClaimed(id)),
                None => Err(DomainError::TaskNotFound(id)),
            };
        }

        debug!(task_id = %id, session_id, "task claimed");
        self.fetch(id).await?.ok_or(DomainError::TaskNotFound(id))
    }

    async fn complete(
        &self,
        id: Uuid,
        summary: &str,
        files_modified: &[String],
    ) -> DomainResult<Task> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET status = 'completed', completed_at = ?, completion_summary = ?,
                files_modified = ?, updated_at = ?
            WHERE id = ? AND status = 'in_progress'
            ",
        )
        .bind(&now)
        .bind(summary)
        .bind(encode_json(&files_modified.to_vec())?)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.fetch(id).await? {
                Some(task) => Err(DomainError::InvalidTransition {
                    from: task.status.to_string(),
                    to: TaskStatus::Completed.to_string(),
                }),
                None => Err(DomainError::TaskNotFound(id)),
            };
        }

        debug!(task_id = %id, "task completed");
        self.fetch(id).await?.ok_or(DomainError::TaskNotFound(id))
    }

    async fn next_task(&self, plan_id: Uuid) -> DomainResult<Option<Task>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM tasks
            WHERE plan_id = ? AND status IN ('pending', 'ready')
            ORDER BY priority DESC, created_at ASC, id ASC
            ",
        )
        .bind(plan_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let completed: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM tasks WHERE plan_id = ? AND status = 'completed'")
                .bind(plan_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        let completed: std::collections::HashSet<Uuid> = completed
            .into_iter()
            .filter_map(|(id,)| Uuid::parse_str(&id).ok())
            .collect();

        for row in &rows {
            let task = Self::row_to_task(row)?;
            if task.dependencies.iter().all(|dep| completed.contains(dep)) {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    async fn current_for_session(&self, session_id: &str) -> DomainResult<Option<Task>> {
        let row = sqlx::query(
            "SELECT * FROM tasks WHERE claimed_by = ? AND status = 'in_progress' LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn any_in_progress(&self, plan_id: Uuid) -> DomainResult<Option<Task>> {
        let row = sqlx::query(
            "SELECT * FROM tasks WHERE plan_id = ? AND status = 'in_progress' LIMIT 1",
        )
        .bind(plan_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn set_git_baseline(&self, id: Uuid, files: &[String]) -> DomainResult<()> {
        // First write wins; a task whose baseline is already recorded is
        // left untouched.
        let result = sqlx::query(
            r"
            UPDATE tasks SET git_baseline = ?, updated_at = ?
            WHERE id = ? AND git_baseline IS NULL
            ",
        )
        .bind(encode_json(&files.to_vec())?)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && self.fetch(id).await?.is_none() {
            return Err(DomainError::TaskNotFound(id));
        }
        Ok(())
    }

    async fn count_open(&self, plan_id: Uuid) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM tasks
            WHERE plan_id = ? AND status IN ('pending', 'ready', 'in_progress')
            ",
        )
        .bind(plan_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn count_with_status(&self, plan_id: Uuid, status: TaskStatus) -> DomainResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE plan_id = ? AND status = ?")
                .bind(plan_id.to_string())
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
