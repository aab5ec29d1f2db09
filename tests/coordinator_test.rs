//! End-to-end coordinator scenarios with stub agents: the clarify →
//! generate gate, clarify round persistence, the policy gate on
//! completion, and the full completion flow with audit.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use taskwing::domain::models::{
    ClarifyAnswer, ClarifyConfig, ClarifyState, GitConfig, KnowledgeConfig, PlanStatus,
    ScopeConfig, TaskStatus,
};
use taskwing::domain::ports::{
    AgentError, AuditFindings, AuditOutcome, AuditService, AuditStatus, Clarifier,
    ClarifierOutput, ClarifyContext, ClarifyRepository, KnowledgeRepository, PlanRepository,
    PlannedTask, Planner, PlannerOutput, TaskRepository,
};
use taskwing::infrastructure::database::{
    ClarifyRepositoryImpl, KnowledgeRepositoryImpl, PlanRepositoryImpl, TaskRepositoryImpl,
};
use taskwing::infrastructure::git::GitDriver;
use taskwing::services::{
    ClarifyParams, CompleteParams, GenerateParams, KnowledgeService, PlanCoordinator,
    PolicyEngine, PolicyRule, StartParams, TaskCoordinator, TaskEnricher,
};

use common::{sample_plan, sample_task, setup_test_db};

/// Clarifier that asks one question, then resolves once any answer has
/// been recorded in the session history.
struct StubClarifier;

#[async_trait]
impl Clarifier for StubClarifier {
    async fn clarify(&self, ctx: &ClarifyContext) -> Result<ClarifierOutput, AgentError> {
        let answered = ctx.history.iter().any(|turn| !turn.answers.is_empty());
        if answered {
            Ok(ClarifierOutput {
                questions: Vec::new(),
                goal_summary: "a streaming-based goal".to_string(),
                enriched_goal: "Full spec: use streaming end to end".to_string(),
                is_ready_to_plan: true,
            })
        } else {
            Ok(ClarifierOutput {
                questions: vec!["Q1?".to_string()],
                goal_summary: "a vague goal".to_string(),
                enriched_goal: String::new(),
                is_ready_to_plan: false,
            })
        }
    }

    async fn auto_answer(
        &self,
        _ctx: &ClarifyContext,
        questions: &[String],
    ) -> Result<Vec<ClarifyAnswer>, AgentError> {
        Ok(questions
            .iter()
            .map(|q| ClarifyAnswer {
                question: q.clone(),
                answer: "sensible default".to_string(),
            })
            .collect())
    }
}

/// Planner that produces two tasks, the second depending on the first.
struct StubPlanner;

#[async_trait]
impl Planner for StubPlanner {
    async fn plan(
        &self,
        _goal: &str,
        _enriched_goal: &str,
        _context: Option<&str>,
    ) -> Result<PlannerOutput, AgentError> {
        Ok(PlannerOutput {
            tasks: vec![
                PlannedTask {
                    title: "Build the database schema".to_string(),
                    description: "Create the sql migration for the new tables".to_string(),
                    priority: 80,
                    expected_files: vec!["migrations/0001.sql".to_string()],
                    ..Default::default()
                },
                PlannedTask {
                    title: "Wire the api endpoint".to_string(),
                    description: "Expose the http handler and route".to_string(),
                    priority: 60,
                    depends_on: vec![0],
                    ..Default::default()
                },
            ],
            phases: Vec::new(),
        })
    }
}

struct StubAuditor;

#[async_trait]
impl AuditService for StubAuditor {
    async fn audit_with_auto_fix(
        &self,
        _plan: &taskwing::domain::models::Plan,
        _tasks: &[taskwing::domain::models::Task],
        _auto_fix: bool,
    ) -> Result<AuditOutcome, AgentError> {
        Ok(AuditOutcome {
            final_status: AuditStatus::Verified,
            attempts: 1,
            fixes_applied: Vec::new(),
            final_audit: AuditFindings {
                build_passed: true,
                tests_passed: true,
                semantic_issues: Vec::new(),
            },
        })
    }
}

struct Harness {
    plans: Arc<PlanRepositoryImpl>,
    tasks: Arc<TaskRepositoryImpl>,
    sessions: Arc<ClarifyRepositoryImpl>,
    plan_coordinator: Arc<PlanCoordinator>,
    task_coordinator: TaskCoordinator,
    _dir: TempDir,
}

fn build_harness(pool: sqlx::SqlitePool, dir: TempDir, policies: PolicyEngine) -> Harness {
    let plans = Arc::new(PlanRepositoryImpl::new(pool.clone()));
    let tasks = Arc::new(TaskRepositoryImpl::new(pool.clone()));
    let sessions = Arc::new(ClarifyRepositoryImpl::new(pool.clone()));
    let knowledge_repo: Arc<dyn KnowledgeRepository> =
        Arc::new(KnowledgeRepositoryImpl::new(pool));
    let knowledge = Arc::new(KnowledgeService::new(
        knowledge_repo,
        KnowledgeConfig::default(),
    ));
    let enricher = Arc::new(TaskEnricher::new(ScopeConfig::default()));

    let plan_coordinator = Arc::new(PlanCoordinator::new(
        plans.clone(),
        tasks.clone(),
        sessions.clone(),
        knowledge.clone(),
        enricher,
        Arc::new(StubClarifier),
        Arc::new(StubPlanner),
        Arc::new(StubAuditor),
        ClarifyConfig::default(),
    ));

    // Git runs against a bare temp directory; every git side effect is
    // expected to degrade gracefully.
    let git = Arc::new(GitDriver::new(dir.path(), "origin"));
    let task_coordinator = TaskCoordinator::new(
        plans.clone(),
        tasks.clone(),
        knowledge,
        Arc::new(policies),
        git,
        plan_coordinator.clone(),
        None,
        GitConfig::default(),
    );

    Harness {
        plans,
        tasks,
        sessions,
        plan_coordinator,
        task_coordinator,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    let (pool, dir) = setup_test_db().await;
    build_harness(pool, dir, PolicyEngine::new(Vec::new()))
}

async fn harness_with_policies(rules: Vec<PolicyRule>) -> Harness {
    let (pool, dir) = setup_test_db().await;
    build_harness(pool, dir, PolicyEngine::new(rules))
}

// ---- Clarify ----

#[tokio::test]
async fn two_round_clarify_persists_turns_and_answers() {
    let h = harness().await;

    // Round 1: a fresh session gets one question back.
    let round1 = h
        .plan_coordinator
        .clarify(ClarifyParams {
            goal: "Build an event pipeline".to_string(),
            ..Default::default()
        })
        .await
        .expect("round 1 failed");
    assert!(round1.success);
    assert!(!round1.is_ready_to_plan);
    assert_eq!(round1.questions, vec!["Q1?".to_string()]);
    assert_eq!(round1.round_index, 1);

    let session_id: Uuid = round1.clarify_session_id.parse().expect("session id");

    // Round 2: answering resolves the session.
    let round2 = h
        .plan_coordinator
        .clarify(ClarifyParams {
            goal: "Build an event pipeline".to_string(),
            clarify_session_id: Some(session_id),
            answers: vec![ClarifyAnswer {
                question: "Q1?".to_string(),
                answer: "Use streaming".to_string(),
            }],
            ..Default::default()
        })
        .await
        .expect("round 2 failed");
    assert!(round2.success);
    assert!(round2.is_ready_to_plan);
    assert_eq!(round2.round_index, 2);
    assert!(!round2.enriched_goal.is_empty());

    // Both turns are on record, in order, with the answer captured.
    let turns = h.sessions.list_turns(session_id).await.expect("turns");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].round_index, 1);
    assert_eq!(turns[1].round_index, 2);
    assert!(turns[1]
        .answers
        .iter()
        .any(|a| a.answer == "Use streaming"));

    let session = h
        .sessions
        .get_session(session_id)
        .await
        .expect("get session")
        .unwrap();
    assert_eq!(session.state, ClarifyState::ReadyToPlan);
    assert_eq!(session.round_index, 2);
}

#[tokio::test]
async fn clarify_is_idempotent_once_ready() {
    let h = harness().await;

    let round1 = h
        .plan_coordinator
        .clarify(ClarifyParams {
            goal: "goal".to_string(),
            ..Default::default()
        })
        .await
        .expect("round 1");
    let session_id: Uuid = round1.clarify_session_id.parse().unwrap();

    let round2 = h
        .plan_coordinator
        .clarify(ClarifyParams {
            goal: "goal".to_string(),
            clarify_session_id: Some(session_id),
            answers: vec![ClarifyAnswer {
                question: "Q1?".to_string(),
                answer: "yes".to_string(),
            }],
            ..Default::default()
        })
        .await
        .expect("round 2");
    assert!(round2.is_ready_to_plan);
    let enriched = round2.enriched_goal.clone();

    // Repeated calls with no answers change nothing.
    for _ in 0..2 {
        let replay = h
            .plan_coordinator
            .clarify(ClarifyParams {
                goal: "goal".to_string(),
                clarify_session_id: Some(session_id),
                ..Default::default()
            })
            .await
            .expect("replay");
        assert!(replay.success);
        assert!(replay.is_ready_to_plan);
        assert_eq!(replay.enriched_goal, enriched);
        assert_eq!(replay.round_index, 2);
    }

    let turns = h.sessions.list_turns(session_id).await.expect("turns");
    assert_eq!(turns.len(), 2, "idempotent replays must not add turns");
}

// ---- Generate gate ----

#[tokio::test]
async fn generate_is_gated_on_unresolved_clarification() {
    let h = harness().await;

    // Session exists but has an outstanding question.
    let round1 = h
        .plan_coordinator
        .clarify(ClarifyParams {
            goal: "gated goal".to_string(),
            ..Default::default()
        })
        .await
        .expect("round 1");
    assert!(!round1.is_ready_to_plan);
    let session_id: Uuid = round1.clarify_session_id.parse().unwrap();

    for _ in 0..2 {
        let generate = h
            .plan_coordinator
            .generate(GenerateParams {
                goal: "gated goal".to_string(),
                clarify_session_id: Some(session_id),
                enriched_goal: Some("anything".to_string()),
                save: true,
            })
            .await
            .expect("generate call");
        assert!(!generate.success);
        assert!(
            generate.message.contains("clarification is not complete"),
            "unexpected message: {}",
            generate.message
        );
    }

    // No plan was persisted by the gated calls.
    let all_plans = h.plans.list().await.expect("list");
    assert!(all_plans.is_empty());
}

#[tokio::test]
async fn generate_with_missing_session_fails_the_same_way() {
    let h = harness().await;

    let generate = h
        .plan_coordinator
        .generate(GenerateParams {
            goal: "goal".to_string(),
            clarify_session_id: Some(Uuid::new_v4()),
            enriched_goal: None,
            save: true,
        })
        .await
        .expect("generate call");
    assert!(!generate.success);
    assert!(generate.message.contains("clarification is not complete"));
}

#[tokio::test]
async fn generate_saves_active_plan_with_enriched_tasks() {
    let h = harness().await;

    let round1 = h
        .plan_coordinator
        .clarify(ClarifyParams {
            goal: "Ship the pipeline".to_string(),
            ..Default::default()
        })
        .await
        .expect("round 1");
    let session_id: Uuid = round1.clarify_session_id.parse().unwrap();
    h.plan_coordinator
        .clarify(ClarifyParams {
            goal: "Ship the pipeline".to_string(),
            clarify_session_id: Some(session_id),
            answers: vec![ClarifyAnswer {
                question: "Q1?".to_string(),
                answer: "streaming".to_string(),
            }],
            ..Default::default()
        })
        .await
        .expect("round 2");

    let generate = h
        .plan_coordinator
        .generate(GenerateParams {
            goal: "Ship the pipeline".to_string(),
            clarify_session_id: Some(session_id),
            enriched_goal: None,
            save: true,
        })
        .await
        .expect("generate");
    assert!(generate.success, "{}", generate.message);
    assert_eq!(generate.tasks.len(), 2);

    let plan_id: Uuid = generate.plan_id.expect("plan id").parse().unwrap();
    let active = h.plans.get_active().await.expect("active").unwrap();
    assert_eq!(active.id, plan_id);
    assert_eq!(active.status, PlanStatus::Active);
    assert_eq!(active.clarify_session_id, Some(session_id));

    let tasks = h.tasks.list_by_plan(plan_id).await.expect("tasks");
    assert_eq!(tasks.len(), 2);
    // Enricher filled scope/keywords for tasks the planner left bare.
    let schema_task = tasks
        .iter()
        .find(|t| t.title.contains("schema"))
        .expect("schema task");
    assert_eq!(schema_task.scope, "database");
    assert!(!schema_task.keywords.is_empty());
    assert!(!schema_task.suggested_recall_queries.is_empty());
    // Dependency indices were translated to task ids.
    let api_task = tasks
        .iter()
        .find(|t| t.title.contains("api"))
        .expect("api task");
    assert_eq!(api_task.dependencies, vec![schema_task.id]);
}

// ---- Policy gate ----

#[tokio::test]
async fn policy_denial_keeps_task_in_progress() {
    let h = harness_with_policies(vec![PolicyRule {
        name: "no-env-edits".to_string(),
        reason: "environment files must not be modified".to_string(),
        file_patterns: vec![".env".to_string()],
        keywords: Vec::new(),
    }])
    .await;

    let plan = sample_plan("policy goal");
    h.plans.create(&plan).await.expect("create plan");
    h.plans.set_active(plan.id).await.expect("activate");
    let task = sample_task(plan.id, "touches env");
    h.tasks.create(&task).await.expect("create task");
    h.tasks.claim(task.id, "session-1").await.expect("claim");

    let result = h
        .task_coordinator
        .complete(CompleteParams {
            task_id: task.id,
            summary: Some("done".to_string()),
            files_modified: Some(vec![".env".to_string()]),
        })
        .await
        .expect("complete call");

    assert!(!result.success);
    assert!(result.policy_violation);
    assert!(!result.policy_errors.is_empty());

    // The task is untouched in storage: still claimed, still in progress.
    let stored = h.tasks.get(task.id).await.expect("get").unwrap();
    assert_eq!(stored.status, TaskStatus::InProgress);
    assert_eq!(stored.claimed_by.as_deref(), Some("session-1"));
    assert!(stored.completed_at.is_none());
}

#[tokio::test]
async fn completion_proceeds_when_policy_allows() {
    let h = harness_with_policies(vec![PolicyRule {
        name: "no-env-edits".to_string(),
        reason: "environment files must not be modified".to_string(),
        file_patterns: vec![".env".to_string()],
        keywords: Vec::new(),
    }])
    .await;

    let plan = sample_plan("policy goal");
    h.plans.create(&plan).await.expect("create plan");
    h.plans.set_active(plan.id).await.expect("activate");
    let task = sample_task(plan.id, "safe change");
    h.tasks.create(&task).await.expect("create task");
    h.tasks.claim(task.id, "session-1").await.expect("claim");

    let result = h
        .task_coordinator
        .complete(CompleteParams {
            task_id: task.id,
            summary: None,
            files_modified: Some(vec!["src/safe.rs".to_string()]),
        })
        .await
        .expect("complete call");

    assert!(result.success, "{}", result.message);
    assert!(!result.policy_violation);
    let stored = h.tasks.get(task.id).await.expect("get").unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}

// ---- Full completion flow ----

#[tokio::test]
async fn completing_last_task_triggers_audit_and_verifies_plan() {
    let h = harness().await;

    let plan = sample_plan("finish goal");
    h.plans.create(&plan).await.expect("create plan");
    h.plans.set_active(plan.id).await.expect("activate");
    let task = sample_task(plan.id, "the only task");
    h.tasks.create(&task).await.expect("create task");

    let started = h
        .task_coordinator
        .start(StartParams {
            task_id: task.id,
            session_id: "session-1".to_string(),
        })
        .await
        .expect("start");
    assert!(started.success, "{}", started.message);

    let result = h
        .task_coordinator
        .complete(CompleteParams {
            task_id: task.id,
            summary: Some("shipped".to_string()),
            files_modified: Some(vec!["src/lib.rs".to_string()]),
        })
        .await
        .expect("complete");

    assert!(result.success, "{}", result.message);
    assert_eq!(result.audit_status.as_deref(), Some("verified"));
    assert!(result.sentinel_report.is_some());

    // The stub audit verified the plan.
    let plan = h.plans.get(plan.id).await.expect("get plan").unwrap();
    assert_eq!(plan.status, PlanStatus::Verified);
    assert_eq!(plan.last_audit_status.as_deref(), Some("verified"));
}

#[tokio::test]
async fn second_start_reports_task_as_claimed() {
    let h = harness().await;

    let plan = sample_plan("contention");
    h.plans.create(&plan).await.expect("create plan");
    h.plans.set_active(plan.id).await.expect("activate");
    let task = sample_task(plan.id, "contested");
    h.tasks.create(&task).await.expect("create task");

    let first = h
        .task_coordinator
        .start(StartParams {
            task_id: task.id,
            session_id: "session-a".to_string(),
        })
        .await
        .expect("first start");
    assert!(first.success);

    let second = h
        .task_coordinator
        .start(StartParams {
            task_id: task.id,
            session_id: "session-b".to_string(),
        })
        .await
        .expect("second start");
    assert!(!second.success);
    assert!(
        second.message.contains("may have been claimed"),
        "unexpected message: {}",
        second.message
    );

    let stored = h.tasks.get(task.id).await.expect("get").unwrap();
    assert_eq!(stored.claimed_by.as_deref(), Some("session-a"));
}

#[tokio::test]
async fn next_without_active_plan_is_actionable() {
    let h = harness().await;

    let result = h
        .task_coordinator
        .next(taskwing::services::NextParams {
            create_branch: false,
            ..Default::default()
        })
        .await
        .expect("next");
    assert!(!result.success);
    assert!(result.message.contains("No active plan"));
}

#[tokio::test]
async fn next_claims_and_captures_context_with_auto_start() {
    let h = harness().await;

    let plan = sample_plan("auto start goal");
    h.plans.create(&plan).await.expect("create plan");
    h.plans.set_active(plan.id).await.expect("activate");
    let mut task = sample_task(plan.id, "database schema work");
    task.suggested_recall_queries = vec!["database patterns".to_string()];
    h.tasks.create(&task).await.expect("create task");

    let result = h
        .task_coordinator
        .next(taskwing::services::NextParams {
            session_id: Some("session-1".to_string()),
            auto_start: true,
            create_branch: false,
            ..Default::default()
        })
        .await
        .expect("next");

    assert!(result.success, "{}", result.message);
    let claimed = result.task.expect("task returned");
    assert_eq!(claimed.status, TaskStatus::InProgress);
    assert_eq!(claimed.claimed_by.as_deref(), Some("session-1"));
}
