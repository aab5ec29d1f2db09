//! Task repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskStatus};

/// Repository interface for Task persistence.
///
/// `claim` is the single linearization point for concurrent session
/// contention: the first claim wins, all losers see `AlreadyClaimed`.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task.
    async fn create(&self, task: &Task) -> DomainResult<()>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// List tasks belonging to a plan, in creation order.
    async fn list_by_plan(&self, plan_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Update a task row from the given model.
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// Update only the task status.
    async fn update_status(&self, id: Uuid, status: TaskStatus) -> DomainResult<()>;

    /// Claim a task for a session.
    ///
    /// Fails with `AlreadyClaimed` unless the task status is `pending` or
    /// `ready`; otherwise sets `in_progress`, `claimed_by` and `claimed_at`
    /// in a single write.
    async fn claim(&self, id: Uuid, session_id: &str) -> DomainResult<Task>;

    /// Complete a task. Only allowed from `in_progress`; transitions to
    /// `completed`, setting `completed_at`, `completion_summary` and
    /// `files_modified` in one transaction.
    async fn complete(
        &self,
        id: Uuid,
        summary: &str,
        files_modified: &[String],
    ) -> DomainResult<Task>;

    /// Highest-priority claimable task whose dependencies are all
    /// `completed`. Ties broken by earliest `created_at`, then by id
    /// lexicographically. `None` when nothing is claimable.
    async fn next_task(&self, plan_id: Uuid) -> DomainResult<Option<Task>>;

    /// The `in_progress` task claimed by the given session, if any.
    async fn current_for_session(&self, session_id: &str) -> DomainResult<Option<Task>>;

    /// Any `in_progress` task within a plan.
    async fn any_in_progress(&self, plan_id: Uuid) -> DomainResult<Option<Task>>;

    /// Record the pre-task baseline. First write wins; later calls are
    /// no-ops so the baseline is set at most once per task lifetime.
    async fn set_git_baseline(&self, id: Uuid, files: &[String]) -> DomainResult<()>;

    /// Count tasks in the plan that still need work
    /// (`pending`, `ready` or `in_progress`).
    async fn count_open(&self, plan_id: Uuid) -> DomainResult<u64>;

    /// Count tasks in the plan with the given status.
    async fn count_with_status(&self, plan_id: Uuid, status: TaskStatus) -> DomainResult<u64>;
}
