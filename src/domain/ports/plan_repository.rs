//! Plan repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Plan, PlanStatus};

/// Repository interface for Plan persistence.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Create a new plan.
    async fn create(&self, plan: &Plan) -> DomainResult<()>;

    /// Get a plan by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Plan>>;

    /// List all plans, newest first.
    async fn list(&self) -> DomainResult<Vec<Plan>>;

    /// Get the single active plan, if any.
    async fn get_active(&self) -> DomainResult<Option<Plan>>;

    /// Atomically clear active status on all plans and set it on `id`.
    ///
    /// Both writes happen in one transaction so at most one plan is ever
    /// observed as active.
    async fn set_active(&self, id: Uuid) -> DomainResult<()>;

    /// Update a plan row from the given model.
    async fn update(&self, plan: &Plan) -> DomainResult<()>;

    /// Update only the plan status.
    async fn update_status(&self, id: Uuid, status: PlanStatus) -> DomainResult<()>;

    /// Persist an audit report and the resulting status.
    async fn update_audit_report(
        &self,
        id: Uuid,
        status: &str,
        report: &serde_json::Value,
    ) -> DomainResult<()>;

    /// Record the PR opened for a plan.
    async fn update_pr_url(&self, id: Uuid, pr_url: &str) -> DomainResult<()>;

    /// Delete a plan; owned tasks cascade.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
}
