//! Task coordinator: next → start → complete.
//!
//! Coordinates task claims across sessions, drives the git branch
//! lifecycle, enforces policy as a hard gate before completion, and
//! runs the sentinel against git ground truth. Git side effects are
//! best-effort and recorded, never silently swallowed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{GitConfig, Plan, SentinelReport, Task};
use crate::domain::ports::{PlanRepository, TaskRepository};
use crate::infrastructure::git::{CommitOutcome, GitDriver, GitError};
use crate::services::knowledge::KnowledgeService;
use crate::services::plan_coordinator::{AuditParams, PlanCoordinator};
use crate::services::policy::{PolicyEngine, TaskPolicyInput};
use crate::services::sentinel::Sentinel;
use crate::services::verifier::GitVerifier;

/// Outcome of a best-effort side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Not attempted
    Skipped,
    Succeeded,
    Failed,
}

/// Inputs for `task.next`.
#[derive(Debug, Clone)]
pub struct NextParams {
    pub plan_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub auto_start: bool,
    pub create_branch: bool,
    pub skip_unpushed_check: bool,
}

impl Default for NextParams {
    fn default() -> Self {
        Self {
            plan_id: None,
            session_id: None,
            auto_start: false,
            create_branch: true,
            skip_unpushed_check: false,
        }
    }
}

/// Inputs for `task.current`.
#[derive(Debug, Clone, Default)]
pub struct CurrentParams {
    pub plan_id: Option<Uuid>,
    pub session_id: Option<String>,
}

/// Inputs for `task.start`.
#[derive(Debug, Clone)]
pub struct StartParams {
    pub task_id: Uuid,
    pub session_id: String,
}

/// Inputs for `task.complete`.
#[derive(Debug, Clone)]
pub struct CompleteParams {
    pub task_id: Uuid,
    pub summary: Option<String>,
    pub files_modified: Option<Vec<String>>,
}

/// Envelope returned by every task operation.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    pub git_workflow_applied: bool,
    pub git_commit: SideEffect,
    pub git_push: SideEffect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentinel_report: Option<SentinelReport>,
    pub policy_violation: bool,
    pub policy_errors: Vec<String>,
}

impl TaskResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            hint: None,
            task: None,
            plan_id: None,
            context: None,
            git_branch: None,
            git_workflow_applied: false,
            git_commit: SideEffect::Skipped,
            git_push: SideEffect::Skipped,
            audit_status: None,
            audit_attempts: None,
            pr_url: None,
            sentinel_report: None,
            policy_violation: false,
            policy_errors: Vec::new(),
        }
    }

    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            ..Self::failure(message)
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Orchestrates task claims, completion, and their side effects.
pub struct TaskCoordinator {
    plans: Arc<dyn PlanRepository>,
    tasks: Arc<dyn TaskRepository>,
    knowledge: Arc<KnowledgeService>,
    sentinel: Sentinel,
    policies: Arc<PolicyEngine>,
    git: Arc<GitDriver>,
    plan_coordinator: Arc<PlanCoordinator>,
    repo_root: Option<PathBuf>,
    git_config: GitConfig,
}

impl TaskCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        tasks: Arc<dyn TaskRepository>,
        knowledge: Arc<KnowledgeService>,
        policies: Arc<PolicyEngine>,
        git: Arc<GitDriver>,
        plan_coordinator: Arc<PlanCoordinator>,
        repo_root: Option<PathBuf>,
        git_config: GitConfig,
    ) -> Self {
        Self {
            plans,
            tasks,
            knowledge,
            sentinel: Sentinel::new(),
            policies,
            git,
            plan_coordinator,
            repo_root,
            git_config,
        }
    }

    async fn resolve_plan(&self, plan_id: Option<Uuid>) -> Result<Option<Plan>> {
        Ok(match plan_id {
            Some(id) => self.plans.get(id).await?,
            None => self.plans.get_active().await?,
        })
    }

    // ---- Next ----

    /// Find the next claimable task, prepare the git branch, and
    /// optionally claim it for the calling session.
    #[instrument(skip(self, params))]
    pub async fn next(&self, params: NextParams) -> Result<TaskResult> {
        let Some(plan) = self.resolve_plan(params.plan_id).await? else {
            return Ok(TaskResult::failure("No active plan. Generate and save a plan first.")
                .with_hint("run plan.clarify then plan.generate with save=true"));
        };

        let Some(mut task) = self.tasks.next_task(plan.id).await? else {
            let mut result = TaskResult::ok("no pending tasks")
                .with_hint("all tasks are done or claimed; try task.current or plan.audit");
            result.plan_id = Some(plan.id.to_string());
            return Ok(result);
        };

        let mut git_branch = None;
        let mut git_workflow_applied = false;
        if params.create_branch {
            match self
                .git
                .start_plan_workflow(
                    &plan.id.to_string(),
                    &plan.goal,
                    params.skip_unpushed_check || self.git_config.skip_unpushed_check,
                )
                .await
            {
                Ok(workflow) => {
                    git_branch = Some(workflow.branch);
                    git_workflow_applied = true;
                }
                Err(GitError::UnpushedCommits { branch }) => {
                    return Ok(TaskResult::failure(format!(
                        "branch {branch} has unpushed commits"
                    ))
                    .with_hint(
                        "push the commits, or call task.next with skip_unpushed_check=true",
                    ));
                }
                Err(GitError::UnrelatedBranch { branch }) => {
                    return Ok(TaskResult::failure(format!(
                        "working tree is on unrelated plan branch {branch} with uncommitted changes"
                    ))
                    .with_hint("commit or stash that work before switching plans"));
                }
                Err(e) => {
                    // Git is advisory on next: branch setup failing does
                    // not block task dispatch.
                    warn!(error = %e, "git workflow skipped");
                }
            }
        }

        if params.auto_start {
            if let Some(session_id) = params.session_id.as_deref() {
                match self.tasks.claim(task.id, session_id).await {
                    Ok(claimed) => {
                        self.capture_baseline(claimed.id).await;
                        task = self
                            .tasks
                            .get(claimed.id)
                            .await?
                            .unwrap_or(claimed);
                    }
                    Err(DomainError::AlreadyClaimed(_)) => {
                        return Ok(TaskResult::failure(format!(
                            "task \"{}\" may have been claimed by another session",
                            task.title
                        ))
                        .with_hint("call task.next again for a different task"));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let context = self.compose_context(&task).await;
        let hint = if task.suggested_recall_queries.is_empty() {
            "start the task with task.start".to_string()
        } else {
            format!(
                "recall queries for this task: {}",
                task.suggested_recall_queries.join(" | ")
            )
        };

        let mut result = TaskResult::ok(format!("next task: {}", task.title)).with_hint(hint);
        result.plan_id = Some(plan.id.to_string());
        result.task = Some(task);
        result.context = context;
        result.git_branch = git_branch;
        result.git_workflow_applied = git_workflow_applied;
        Ok(result)
    }

    // ---- Current ----

    /// The session's in-progress task, falling back to any in-progress
    /// task in the plan.
    #[instrument(skip(self, params))]
    pub async fn current(&self, params: CurrentParams) -> Result<TaskResult> {
        if let Some(session_id) = params.session_id.as_deref() {
            if let Some(task) = self.tasks.current_for_session(session_id).await? {
                let mut result = TaskResult::ok(format!("current task: {}", task.title));
                result.plan_id = Some(task.plan_id.to_string());
                result.task = Some(task);
                return Ok(result);
            }
        }

        let Some(plan) = self.resolve_plan(params.plan_id).await? else {
            return Ok(TaskResult::failure("No active plan. Generate and save a plan first."));
        };

        match self.tasks.any_in_progress(plan.id).await? {
            Some(task) => {
                let mut result = TaskResult::ok(format!("current task: {}", task.title));
                result.plan_id = Some(plan.id.to_string());
                result.task = Some(task);
                Ok(result)
            }
            None => {
                let mut result = TaskResult::ok("no task in progress")
                    .with_hint("claim one with task.next or task.start");
                result.plan_id = Some(plan.id.to_string());
                Ok(result)
            }
        }
    }

    // ---- Start ----

    /// Claim a specific task for a session and capture the git baseline.
    #[instrument(skip(self, params), fields(task_id = %params.task_id))]
    pub async fn start(&self, params: StartParams) -> Result<TaskResult> {
        if params.session_id.is_empty() {
            return Ok(TaskResult::failure("session_id is required to start a task"));
        }

        let task = match self.tasks.claim(params.task_id, &params.session_id).await {
            Ok(task) => task,
            Err(DomainError::AlreadyClaimed(id)) => {
                return Ok(TaskResult::failure(format!(
                    "task {id} may have been claimed by another session"
                ))
                .with_hint("fetch the next available task with task.next"));
            }
            Err(DomainError::TaskNotFound(id)) => {
                return Ok(TaskResult::failure(format!("task {id} not found"))
                    .with_hint("list claimable work with task.next"));
            }
            Err(e) => return Err(e.into()),
        };

        self.capture_baseline(task.id).await;
        let task = self.tasks.get(task.id).await?.unwrap_or(task);

        info!(task_id = %task.id, session_id = %params.session_id, "task started");

        let context = self.compose_context(&task).await;
        let hint = if task.suggested_recall_queries.is_empty() {
            "report completion with task.complete".to_string()
        } else {
            format!(
                "recall queries for this task: {}",
                task.suggested_recall_queries.join(" | ")
            )
        };

        let mut result = TaskResult::ok(format!("started: {}", task.title)).with_hint(hint);
        result.plan_id = Some(task.plan_id.to_string());
        result.task = Some(task);
        result.context = context;
        Ok(result)
    }

    // ---- Complete ----

    /// Complete a task. Policy evaluates strictly before any state
    /// mutation; a denial leaves the task in progress. Sentinel, git,
    /// and audit all run after the completion transaction commits.
    #[instrument(skip(self, params), fields(task_id = %params.task_id))]
    pub async fn complete(&self, params: CompleteParams) -> Result<TaskResult> {
        let Some(task) = self.tasks.get(params.task_id).await? else {
            return Ok(TaskResult::failure(format!("task {} not found", params.task_id))
                .with_hint("check the id against the active plan's tasks"));
        };
        let Some(plan) = self.plans.get(task.plan_id).await? else {
            return Ok(TaskResult::failure(format!(
                "plan {} for task {} no longer exists",
                task.plan_id, task.id
            )));
        };

        let files_modified = params
            .files_modified
            .unwrap_or_else(|| task.files_modified.clone());
        let summary = params.summary.unwrap_or_default();

        // Policy gate. Fires before any state mutation so a denial
        // leaves the task claimable by the same session after a fix.
        if self.policies.policy_count() > 0 {
            let decision = self.policies.evaluate_task(&TaskPolicyInput {
                task_id: task.id.to_string(),
                title: task.title.clone(),
                description: task.description.clone(),
                files_modified: files_modified.clone(),
                files_created: Vec::new(),
                plan_id: plan.id.to_string(),
                plan_goal: plan.goal.clone(),
            });
            if !decision.allowed {
                let errors: Vec<String> = decision
                    .violations
                    .iter()
                    .map(|v| format!("[{}] {}", v.rule, v.message))
                    .collect();
                info!(
                    task_id = %task.id,
                    decision_id = %decision.decision_id,
                    "completion denied by policy"
                );
                let mut result = TaskResult::failure(format!(
                    "completion denied by policy:\n{}",
                    errors.join("\n")
                ))
                .with_hint("revert the flagged files and complete again");
                result.policy_violation = true;
                result.policy_errors = errors;
                result.task = Some(task);
                return Ok(result);
            }
        }

        let task = match self
            .tasks
            .complete(task.id, &summary, &files_modified)
            .await
        {
            Ok(task) => task,
            Err(DomainError::InvalidTransition { from, .. }) => {
                return Ok(TaskResult::failure(format!(
                    "cannot complete a task in status {from}; it must be in_progress"
                ))
                .with_hint("claim the task with task.start before completing it"));
            }
            Err(e) => return Err(e.into()),
        };

        let report = self
            .sentinel
            .analyze_with_verification(&task, self.repo_root.as_deref())
            .await;

        // Git side effects are independent best-effort steps.
        let (git_commit, git_push, git_branch) = self.commit_and_push(&task).await;

        let remaining = self.tasks.count_open(plan.id).await?;
        let mut audit_status = None;
        let mut audit_attempts = None;
        let mut pr_url = None;

        if remaining == 0 {
            info!(plan_id = %plan.id, "all tasks complete, triggering audit");
            match self
                .plan_coordinator
                .audit(AuditParams {
                    plan_id: Some(plan.id),
                    auto_fix: true,
                })
                .await
            {
                Ok(audit) => {
                    audit_status = audit.final_status.clone();
                    audit_attempts = Some(audit.attempts);
                    if audit.final_status.as_deref() == Some("verified") {
                        pr_url = self.open_plan_pr(&plan).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "post-completion audit failed");
                    audit_status = Some("error".to_string());
                }
            }
        }

        let mut hint = if remaining == 0 {
            "plan finished; audit has run".to_string()
        } else {
            format!("{remaining} task(s) remaining; call task.next")
        };
        if report.has_critical_deviations() {
            hint = format!("WARNING: critical deviations detected: {}. {hint}", report.summary);
        }

        let mut result =
            TaskResult::ok(format!("completed: {}", task.title)).with_hint(hint);
        result.plan_id = Some(plan.id.to_string());
        result.task = Some(task);
        result.git_branch = git_branch;
        result.git_commit = git_commit;
        result.git_push = git_push;
        result.audit_status = audit_status;
        result.audit_attempts = audit_attempts;
        result.pr_url = pr_url;
        result.sentinel_report = Some(report);
        Ok(result)
    }

    // ---- helpers ----

    /// Record which files were already dirty before the task's work
    /// started. Best effort, first write wins.
    async fn capture_baseline(&self, task_id: Uuid) {
        let Some(root) = self.repo_root.as_deref() else {
            return;
        };
        let verifier = GitVerifier::new(root, self.git_config.remote.clone());
        if !matches!(verifier.driver().is_repo().await, Ok(true)) {
            return;
        }
        match verifier.get_actual_modifications().await {
            Ok(files) => {
                if let Err(e) = self.tasks.set_git_baseline(task_id, &files).await {
                    warn!(task_id = %task_id, error = %e, "failed to store git baseline");
                }
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "failed to capture git baseline");
            }
        }
    }

    /// Markdown context block: early-bound summary plus late-bound
    /// knowledge recall.
    async fn compose_context(&self, task: &Task) -> Option<String> {
        let mut sections = Vec::new();

        if !task.context_summary.is_empty() {
            sections.push(format!("## Bound Context\n{}", task.context_summary));
        }

        if let Some(query) = task.suggested_recall_queries.first() {
            match self.knowledge.search(query, 3).await {
                Ok(hits) if !hits.is_empty() => {
                    let lines: Vec<String> = hits
                        .iter()
                        .map(|h| format!("- [{}] {}", h.node.node_type, h.node.summary))
                        .collect();
                    sections.push(format!("## Recalled Knowledge\n{}", lines.join("\n")));
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "context recall failed"),
            }
        }

        if !task.acceptance_criteria.is_empty() {
            let lines: Vec<String> = task
                .acceptance_criteria
                .iter()
                .map(|c| format!("- {c}"))
                .collect();
            sections.push(format!("## Acceptance Criteria\n{}", lines.join("\n")));
        }

        (!sections.is_empty()).then(|| sections.join("\n\n"))
    }

    /// Commit and push task progress. Push only runs when the commit
    /// actually landed.
    async fn commit_and_push(&self, task: &Task) -> (SideEffect, SideEffect, Option<String>) {
        let branch = match self.git.current_branch().await {
            Ok(branch) => Some(branch),
            Err(e) => {
                warn!(error = %e, "could not resolve current branch");
                None
            }
        };

        let commit = match self.git.commit_task_progress(&task.title, &task.scope).await {
            Ok(CommitOutcome::Committed) => SideEffect::Succeeded,
            Ok(CommitOutcome::NothingToCommit) => SideEffect::Skipped,
            Err(e) => {
                warn!(error = %e, "task progress commit failed");
                SideEffect::Failed
            }
        };

        let push = if commit == SideEffect::Succeeded {
            match branch.as_deref() {
                Some(branch) => match self.git.push_task_progress(branch).await {
                    Ok(()) => SideEffect::Succeeded,
                    Err(e) => {
                        warn!(error = %e, "task progress push failed");
                        SideEffect::Failed
                    }
                },
                None => SideEffect::Skipped,
            }
        } else {
            SideEffect::Skipped
        };

        (commit, push, branch)
    }

    /// Open the plan PR after a verified audit. Best effort.
    async fn open_plan_pr(&self, plan: &Plan) -> Option<String> {
        if !self.git.is_gh_installed().await {
            return None;
        }
        let tasks = self.tasks.list_by_plan(plan.id).await.ok()?;
        let completed: Vec<(String, String)> = tasks
            .iter()
            .filter(|t| t.status == crate::domain::models::TaskStatus::Completed)
            .map(|t| (t.title.clone(), t.completion_summary.clone()))
            .collect();
        let base = self.git.default_branch().await.ok()?;

        match self.git.create_plan_pr(&plan.goal, &completed, &base).await {
            Ok(pr) => {
                if let Err(e) = self.plans.update_pr_url(plan.id, &pr.url).await {
                    warn!(error = %e, "failed to persist PR url");
                }
                info!(url = %pr.url, "plan PR opened");
                Some(pr.url)
            }
            Err(e) => {
                warn!(error = %e, "PR creation failed");
                None
            }
        }
    }
}
