//! SQLite implementation of the plan repository.
//!
//! `set_active` demotes the previous active plan and promotes the new
//! one inside a single transaction, so at most one plan is ever
//! observed as active.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Phase, Plan, PlanStatus};
use crate::domain::ports::PlanRepository;
use crate::infrastructure::database::utils::{decode_json, encode_json, parse_datetime};

/// SQLite implementation of `PlanRepository` using sqlx.
pub struct PlanRepositoryImpl {
    pool: SqlitePool,
}

impl PlanRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_plan(row: &SqliteRow) -> DomainResult<Plan> {
        let status: String = row.get("status");
        Ok(Plan {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            goal: row.get("goal"),
            enriched_goal: row.get("enriched_goal"),
            status: status.parse()?,
            phases: decode_json::<Vec<Phase>>(row.get("phases"))?,
            clarify_session_id: row
                .get::<Option<String>, _>("clarify_session_id")
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()?,
            pr_url: row.get("pr_url"),
            last_audit_status: row.get("last_audit_status"),
            last_audit_report: row
                .get::<Option<String>, _>("last_audit_report")
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }
}

#[async_trait]
impl PlanRepository for PlanRepositoryImpl {
    async fn create(&self, plan: &Plan) -> DomainResult<()> {
        sqlx::query(
            r"
            INSERT INTO plans (
                id, goal, enriched_goal, status, phases, clarify_session_id,
                pr_url, last_audit_status, last_audit_report, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(plan.id.to_string())
        .bind(&plan.goal)
        .bind(&plan.enriched_goal)
        .bind(plan.status.as_str())
        .bind(encode_json(&plan.phases)?)
        .bind(plan.clarify_session_id.map(|id| id.to_string()))
        .bind(plan.pr_url.as_deref())
        .bind(plan.last_audit_status.as_deref())
        .bind(
            plan.last_audit_report
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(plan.created_at.to_rfc3339())
        .bind(plan.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Plan>> {
        let row = sqlx::query("SELECT * FROM plans WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_plan).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<Plan>> {
        let rows = sqlx::query("SELECT * FROM plans ORDER BY created_at DESC, id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_plan).collect()
    }

    async fn get_active(&self) -> DomainResult<Option<Plan>> {
        let row = sqlx::query("SELECT * FROM plans WHERE status = 'active' LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_plan).transpose()
    }

    async fn set_active(&self, id: Uuid) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE plans SET status = 'archived', updated_at = ? WHERE status = 'active' AND id != ?",
        )
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("UPDATE plans SET status = 'active', updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::PlanNotFound(id));
        }

        tx.commit().await?;
        debug!(plan_id = %id, "plan activated");
        Ok(())
    }

    async fn update(&self, plan: &Plan) -> DomainResult<()> {
        let result = sqlx::query(
            r"
            UPDATE plans SET
                goal = ?, enriched_goal = ?, status = ?, phases = ?,
                clarify_session_id = ?, pr_url = ?, last_audit_status = ?,
                last_audit_report = ?, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(&plan.goal)
        .bind(&plan.enriched_goal)
        .bind(plan.status.as_str())
        .bind(encode_json(&plan.phases)?)
        .bind(plan.clarify_session_id.map(|id| id.to_string()))
        .bind(plan.pr_url.as_deref())
        .bind(plan.last_audit_status.as_deref())
        .bind(
            plan.last_audit_report
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(plan.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PlanNotFound(plan.id));
        }
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: PlanStatus) -> DomainResult<()> {
        let result = sqlx::query("UPDATE plans SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PlanNotFound(id));
        }
        Ok(())
    }

    async fn update_audit_report(
        &self,
        id: Uuid,
        status: &str,
        report: &serde_json::Value,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            r"
            UPDATE plans SET last_audit_status = ?, last_audit_report = ?, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(status)
        .bind(serde_json::to_string(report)?)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PlanNotFound(id));
        }
        Ok(())
    }

    async fn update_pr_url(&self, id: Uuid, pr_url: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE plans SET pr_url = ?, updated_at = ? WHERE id = ?")
            .bind(pr_url)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PlanNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PlanNotFound(id));
        }
        Ok(())
    }
}
