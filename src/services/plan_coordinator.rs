//! Plan coordinator: clarify → generate → audit.
//!
//! Owns the plan lifecycle state machine. Clarification runs as a
//! resumable multi-round session; generation is hard-gated on the
//! session being resolved; audit verifies completed work and settles
//! the plan's final status.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{
    ClarifyAnswer, ClarifyConfig, ClarifySession, ClarifyState, ClarifyTurn, Phase, Plan,
    PlanStatus, Task,
};
use crate::domain::ports::{
    AuditService, AuditStatus, Clarifier, ClarifyContext, ClarifyRepository, PlanRepository,
    PlannedTask, Planner, TaskRepository,
};
use crate::services::enricher::TaskEnricher;
use crate::services::knowledge::KnowledgeService;

/// Message returned whenever generation is attempted before the
/// clarify session is resolved.
const GATE_MESSAGE: &str =
    "clarification is not complete; answer the outstanding questions before generating a plan";

/// Inputs for one clarify round.
#[derive(Debug, Clone, Default)]
pub struct ClarifyParams {
    pub goal: String,
    pub clarify_session_id: Option<Uuid>,
    pub answers: Vec<ClarifyAnswer>,
    pub auto_answer: bool,
}

/// Result of one clarify round.
#[derive(Debug, Clone, Serialize)]
pub struct ClarifyResult {
    pub success: bool,
    pub message: String,
    pub questions: Vec<String>,
    pub goal_summary: String,
    pub enriched_goal: String,
    pub is_ready_to_plan: bool,
    pub round_index: u32,
    pub clarify_session_id: String,
}

/// Inputs for plan generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    pub goal: String,
    pub clarify_session_id: Option<Uuid>,
    pub enriched_goal: Option<String>,
    pub save: bool,
}

/// Result of plan generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub enriched_goal: String,
    pub tasks: Vec<Task>,
}

/// Inputs for a plan audit.
#[derive(Debug, Clone, Default)]
pub struct AuditParams {
    pub plan_id: Option<Uuid>,
    pub auto_fix: bool,
}

/// Result of a plan audit.
#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_status: Option<String>,
    pub attempts: u32,
    pub fixes_applied: Vec<String>,
}

/// Orchestrates the plan lifecycle.
pub struct PlanCoordinator {
    plans: Arc<dyn PlanRepository>,
    tasks: Arc<dyn TaskRepository>,
    sessions: Arc<dyn ClarifyRepository>,
    knowledge: Arc<KnowledgeService>,
    enricher: Arc<TaskEnricher>,
    clarifier: Arc<dyn Clarifier>,
    planner: Arc<dyn Planner>,
    auditor: Arc<dyn AuditService>,
    clarify_config: ClarifyConfig,
}

impl PlanCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        tasks: Arc<dyn TaskRepository>,
        sessions: Arc<dyn ClarifyRepository>,
        knowledge: Arc<KnowledgeService>,
        enricher: Arc<TaskEnricher>,
        clarifier: Arc<dyn Clarifier>,
        planner: Arc<dyn Planner>,
        auditor: Arc<dyn AuditService>,
        clarify_config: ClarifyConfig,
    ) -> Self {
        Self {
            plans,
            tasks,
            sessions,
            knowledge,
            enricher,
            clarifier,
            planner,
            auditor,
            clarify_config,
        }
    }

    // ---- Clarify ----

    /// Run one clarification round. Once a session reaches
    /// `ready_to_plan`, further calls are idempotent and return the
    /// captured enriched goal.
    #[instrument(skip(self, params), fields(goal = %params.goal))]
    pub async fn clarify(&self, params: ClarifyParams) -> Result<ClarifyResult> {
        let mut session = match params.clarify_session_id {
            Some(id) => match self.sessions.get_session(id).await? {
                Some(session) => session,
                None => {
                    return Ok(ClarifyResult {
                        success: false,
                        message: format!("clarify session {id} not found"),
                        questions: Vec::new(),
                        goal_summary: String::new(),
                        enriched_goal: String::new(),
                        is_ready_to_plan: false,
                        round_index: 0,
                        clarify_session_id: id.to_string(),
                    });
                }
            },
            None => {
                let session = ClarifySession::new(
                    params.goal.clone(),
                    self.clarify_config.max_rounds,
                    self.clarify_config.max_questions_per_round,
                );
                self.sessions.create_session(&session).await?;
                info!(session_id = %session.id, "clarify session created");
                session
            }
        };

        if session.state == ClarifyState::ReadyToPlan {
            return Ok(self.clarify_result(
                &session,
                true,
                "clarification already complete".to_string(),
            ));
        }
        if session.state == ClarifyState::MaxRoundsExceeded {
            return Ok(self.clarify_result(
                &session,
                false,
                format!(
                    "maximum clarification rounds ({}) exceeded; generate with the current goal or start a new session",
                    session.max_rounds
                ),
            ));
        }

        self.run_round(&mut session, params.answers).await?;

        if !session.is_ready_to_plan && session.state != ClarifyState::MaxRoundsExceeded
            && params.auto_answer
        {
            let ctx = self.clarify_context(&session).await?;
            match self
                .clarifier
                .auto_answer(&ctx, &session.current_questions)
                .await
            {
                Ok(answers) => {
                    self.run_round(&mut session, answers).await?;
                }
                Err(e) => {
                    warn!(error = %e, "auto-answer failed, leaving questions outstanding");
                }
            }
        }

        let message = if session.is_ready_to_plan {
            "clarification complete; ready to generate a plan".to_string()
        } else if session.state == ClarifyState::MaxRoundsExceeded {
            format!("maximum clarification rounds ({}) reached", session.max_rounds)
        } else {
            format!("{} question(s) outstanding", session.current_questions.len())
        };

        Ok(self.clarify_result(&session, true, message))
    }

    /// One clarifier invocation: record the turn, call the agent, fold
    /// its output into the session, persist.
    async fn run_round(
        &self,
        session: &mut ClarifySession,
        answers: Vec<ClarifyAnswer>,
    ) -> Result<()> {
        let turn = ClarifyTurn {
            id: Uuid::new_v4(),
            session_id: session.id,
            round_index: session.round_index + 1,
            questions: session.current_questions.clone(),
            answers,
            created_at: Utc::now(),
        };
        self.sessions.append_turn(&turn).await?;

        let ctx = self.clarify_context(session).await?;
        let output = self
            .clarifier
            .clarify(&ctx)
            .await
            .context("clarifier agent failed")?;

        session.round_index += 1;
        session.current_questions = output
            .questions
            .into_iter()
            .take(session.max_questions_per_round as usize)
            .collect();
        if !output.goal_summary.is_empty() {
            session.goal_summary = output.goal_summary;
        }
        if !output.enriched_goal.is_empty() {
            session.enriched_goal = output.enriched_goal;
        }
        session.is_ready_to_plan = output.is_ready_to_plan;

        session.state = if session.is_ready_to_plan {
            ClarifyState::ReadyToPlan
        } else if session.rounds_exhausted() {
            ClarifyState::MaxRoundsExceeded
        } else {
            ClarifyState::AwaitingAnswers
        };

        self.sessions.update_session(session).await?;
        Ok(())
    }

    async fn clarify_context(&self, session: &ClarifySession) -> Result<ClarifyContext> {
        let history = self.sessions.list_turns(session.id).await?;

        // Context retrieval is best effort; clarification proceeds without it.
        let retrieved_context = match self.knowledge.retrieve_context(&session.goal).await {
            Ok(ctx) if !ctx.context.is_empty() => Some(ctx.context),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "context retrieval failed");
                None
            }
        };

        Ok(ClarifyContext {
            goal: session.goal.clone(),
            enriched_goal: session.enriched_goal.clone(),
            history,
            retrieved_context,
            max_questions: session.max_questions_per_round,
        })
    }

    fn clarify_result(
        &self,
        session: &ClarifySession,
        success: bool,
        message: String,
    ) -> ClarifyResult {
        ClarifyResult {
            success,
            message,
            questions: session.current_questions.clone(),
            goal_summary: session.goal_summary.clone(),
            enriched_goal: session.enriched_goal.clone(),
            is_ready_to_plan: session.is_ready_to_plan,
            round_index: session.round_index,
            clarify_session_id: session.id.to_string(),
        }
    }

    // ---- Generate ----

    /// Generate a plan from a resolved clarify session. Hard-gated:
    /// fails without mutating state while clarification is incomplete.
    #[instrument(skip(self, params), fields(goal = %params.goal))]
    pub async fn generate(&self, params: GenerateParams) -> Result<GenerateResult> {
        let gate_failure = |message: String| GenerateResult {
            success: false,
            message,
            hint: Some("run plan.clarify until is_ready_to_plan is true".to_string()),
            plan_id: None,
            enriched_goal: String::new(),
            tasks: Vec::new(),
        };

        let Some(session_id) = params.clarify_session_id else {
            return Ok(gate_failure(GATE_MESSAGE.to_string()));
        };
        let session = match self.sessions.get_session(session_id).await? {
            Some(session) => session,
            None => return Ok(gate_failure(GATE_MESSAGE.to_string())),
        };
        if !session.is_ready_to_plan {
            return Ok(gate_failure(GATE_MESSAGE.to_string()));
        }

        let plan = Plan::new(params.goal.clone());
        if let Err(e) = plan.validate_goal() {
            return Ok(GenerateResult {
                success: false,
                message: e.to_string(),
                hint: None,
                plan_id: None,
                enriched_goal: String::new(),
                tasks: Vec::new(),
            });
        }

        let enriched_goal = params
            .enriched_goal
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| session.enriched_goal.clone());

        let retrieved = match self.knowledge.retrieve_context(&params.goal).await {
            Ok(ctx) if !ctx.context.is_empty() => Some(ctx.context),
            _ => None,
        };

        let output = self
            .planner
            .plan(&params.goal, &enriched_goal, retrieved.as_deref())
            .await
            .context("planner agent failed")?;

        if output.tasks.is_empty() {
            return Ok(GenerateResult {
                success: false,
                message: "planner produced no tasks".to_string(),
                hint: Some("refine the goal and clarify again".to_string()),
                plan_id: None,
                enriched_goal,
                tasks: Vec::new(),
            });
        }

        let mut plan = plan;
        plan.enriched_goal = enriched_goal.clone();
        plan.clarify_session_id = Some(session.id);
        plan.phases = output
            .phases
            .iter()
            .enumerate()
            .map(|(i, name)| Phase {
                id: Uuid::new_v4(),
                name: name.clone(),
                description: String::new(),
                order: u32::try_from(i).unwrap_or_default(),
            })
            .collect();

        let tasks = self.assemble_tasks(&plan, &output.tasks).await?;

        if params.save {
            // The dependency graph must be a DAG before anything persists.
            if let Some(cycle) = find_cycle(&tasks) {
                bail!("task dependency cycle detected: {cycle:?}");
            }

            self.plans.create(&plan).await?;
            for task in &tasks {
                self.tasks.create(task).await?;
            }
            self.plans.set_active(plan.id).await?;
            info!(plan_id = %plan.id, tasks = tasks.len(), "plan saved and activated");
        }

        Ok(GenerateResult {
            success: true,
            message: format!("generated {} task(s)", tasks.len()),
            hint: params
                .save
                .then(|| "call task.next to start the first task".to_string()),
            plan_id: params.save.then(|| plan.id.to_string()),
            enriched_goal,
            tasks,
        })
    }

    /// Turn planner output into validated, enriched tasks.
    async fn assemble_tasks(&self, plan: &Plan, planned: &[PlannedTask]) -> Result<Vec<Task>> {
        let phase_by_name: HashMap<&str, Uuid> = plan
            .phases
            .iter()
            .map(|p| (p.name.as_str(), p.id))
            .collect();

        let mut tasks: Vec<Task> = Vec::with_capacity(planned.len());
        for planned_task in planned {
            let mut task = Task::new(
                plan.id,
                planned_task.title.clone(),
                planned_task.description.clone(),
            );
            task.priority = planned_task.priority;
            task.acceptance_criteria = planned_task.acceptance_criteria.clone();
            task.validation_steps = planned_task.validation_steps.clone();
            task.expected_files = planned_task.expected_files.clone();
            task.phase_id = planned_task
                .phase
                .as_deref()
                .and_then(|name| phase_by_name.get(name).copied());
            task.validate()
                .with_context(|| format!("invalid planned task \"{}\"", planned_task.title))?;

            let enrichment = self.enricher.enrich(&task.title, &task.description);
            task.scope = planned_task
                .scope
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or(enrichment.scope);
            task.keywords = if planned_task.keywords.is_empty() {
                enrichment.keywords
            } else {
                planned_task.keywords.clone()
            };
            task.suggested_recall_queries = enrichment.suggested_recall_queries;

            tasks.push(task);
        }

        // Dependencies arrive as indices into the planned list.
        for (i, planned_task) in planned.iter().enumerate() {
            let mut deps = Vec::with_capacity(planned_task.depends_on.len());
            for &dep_index in &planned_task.depends_on {
                if dep_index == i || dep_index >= tasks.len() {
                    bail!(
                        "task \"{}\" has an invalid dependency index {dep_index}",
                        planned_task.title
                    );
                }
                deps.push(tasks[dep_index].id);
            }
            tasks[i].dependencies = deps;
        }

        // Early binding: attach recalled context to each task now so
        // dispatch does not need a retrieval round-trip.
        for task in &mut tasks {
            if let Some(query) = task.suggested_recall_queries.first() {
                match self.knowledge.search(query, 3).await {
                    Ok(hits) if !hits.is_empty() => {
                        task.context_summary = hits
                            .iter()
                            .map(|h| format!("- {}", h.node.summary))
                            .collect::<Vec<_>>()
                            .join("\n");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "early context binding failed"),
                }
            }
        }

        Ok(tasks)
    }

    // ---- Audit ----

    /// Audit a plan's completed work and settle its status.
    #[instrument(skip(self, params))]
    pub async fn audit(&self, params: AuditParams) -> Result<AuditResult> {
        let plan = match params.plan_id {
            Some(id) => self.plans.get(id).await?,
            None => self.plans.get_active().await?,
        };
        let Some(plan) = plan else {
            return Ok(AuditResult {
                success: false,
                message: "no plan to audit".to_string(),
                hint: Some("pass plan_id or activate a plan with plan.generate".to_string()),
                plan_id: None,
                final_status: None,
                attempts: 0,
                fixes_applied: Vec::new(),
            });
        };

        let completed = self
            .tasks
            .count_with_status(plan.id, crate::domain::models::TaskStatus::Completed)
            .await?;
        if completed == 0 {
            return Ok(AuditResult {
                success: false,
                message: "plan has no completed tasks to audit".to_string(),
                hint: Some("complete at least one task with task.complete first".to_string()),
                plan_id: Some(plan.id.to_string()),
                final_status: None,
                attempts: 0,
                fixes_applied: Vec::new(),
            });
        }

        let tasks = self.tasks.list_by_plan(plan.id).await?;
        let outcome = match self.auditor.audit_with_auto_fix(&plan, &tasks, params.auto_fix).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // Audit failures are recorded, never raised.
                let report = serde_json::json!({
                    "final_status": "error",
                    "attempts": 0,
                    "error": e.to_string(),
                });
                self.plans
                    .update_audit_report(plan.id, "error", &report)
                    .await?;
                return Ok(AuditResult {
                    success: false,
                    message: format!("audit failed: {e}"),
                    hint: Some("re-run plan.audit once the audit service is available".to_string()),
                    plan_id: Some(plan.id.to_string()),
                    final_status: Some("error".to_string()),
                    attempts: 0,
                    fixes_applied: Vec::new(),
                });
            }
        };

        let report = serde_json::to_value(&outcome)?;
        self.plans
            .update_audit_report(plan.id, outcome.final_status.as_str(), &report)
            .await?;

        match outcome.final_status {
            AuditStatus::Verified => {
                self.plans.update_status(plan.id, PlanStatus::Verified).await?;
            }
            AuditStatus::NeedsRevision => {
                self.plans
                    .update_status(plan.id, PlanStatus::NeedsRevision)
                    .await?;
            }
            AuditStatus::Error => {}
        }

        info!(plan_id = %plan.id, status = %outcome.final_status, "audit complete");

        Ok(AuditResult {
            success: outcome.final_status != AuditStatus::Error,
            message: match outcome.final_status {
                AuditStatus::Verified => "audit passed; plan verified".to_string(),
                AuditStatus::NeedsRevision => {
                    "audit found issues; plan needs revision".to_string()
                }
                AuditStatus::Error => "audit errored; status recorded".to_string(),
            },
            hint: (outcome.final_status == AuditStatus::NeedsRevision)
                .then(|| "inspect the audit report and re-run failing tasks".to_string()),
            plan_id: Some(plan.id.to_string()),
            final_status: Some(outcome.final_status.as_str().to_string()),
            attempts: outcome.attempts,
            fixes_applied: outcome.fixes_applied,
        })
    }
}

/// DFS cycle detection over a plan's task dependency graph.
pub fn find_cycle(tasks: &[Task]) -> Option<Vec<Uuid>> {
    let graph: HashMap<Uuid, &Vec<Uuid>> =
        tasks.iter().map(|t| (t.id, &t.dependencies)).collect();

    fn visit(
        node: Uuid,
        graph: &HashMap<Uuid, &Vec<Uuid>>,
        visited: &mut HashSet<Uuid>,
        rec_stack: &mut HashSet<Uuid>,
        path: &mut Vec<Uuid>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        if let Some(deps) = graph.get(&node) {
            for &dep in deps.iter() {
                if !visited.contains(&dep) {
                    if visit(dep, graph, visited, rec_stack, path) {
                        return true;
                    }
                } else if rec_stack.contains(&dep) {
                    if let Some(start) = path.iter().position(|&id| id == dep) {
                        path.drain(0..start);
                    }
                    return true;
                }
            }
        }

        rec_stack.remove(&node);
        path.pop();
        false
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for task in tasks {
        if !visited.contains(&task.id)
            && visit(task.id, &graph, &mut visited, &mut rec_stack, &mut path)
        {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_tasks(edges: &[(usize, usize)], count: usize) -> Vec<Task> {
        let plan_id = Uuid::new_v4();
        let mut tasks: Vec<Task> = (0..count)
            .map(|i| Task::new(plan_id, format!("task {i}"), "d"))
            .collect();
        for &(from, to) in edges {
            let dep = tasks[to].id;
            tasks[from].dependencies.push(dep);
        }
        tasks
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let tasks = linked_tasks(&[(1, 0), (2, 1)], 3);
        assert!(find_cycle(&tasks).is_none());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut tasks = linked_tasks(&[], 1);
        let id = tasks[0].id;
        tasks[0].dependencies.push(id);
        assert!(find_cycle(&tasks).is_some());
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let tasks = linked_tasks(&[(0, 1), (1, 0)], 2);
        let cycle = find_cycle(&tasks).expect("cycle expected");
        assert_eq!(cycle.len(), 2);
    }
}
