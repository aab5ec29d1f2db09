//! Agent ports.
//!
//! The clarifier, planner and audit service are external LLM-backed
//! collaborators. Their outputs cross this boundary exactly once, as
//! typed structures; coordinators never see raw model output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{ClarifyAnswer, ClarifyTurn, Plan, Task};

/// Error types for agent invocations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    #[error("Agent timed out after {0}s")]
    Timeout(u64),

    #[error("Agent produced invalid output: {0}")]
    InvalidOutput(String),

    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),
}

/// Everything a clarifier sees for one round.
#[derive(Debug, Clone)]
pub struct ClarifyContext {
    pub goal: String,
    pub enriched_goal: String,
    /// Prior rounds, oldest first.
    pub history: Vec<ClarifyTurn>,
    /// Best-effort knowledge retrieval; absent when retrieval failed.
    pub retrieved_context: Option<String>,
    pub max_questions: u32,
}

/// Parsed clarifier round result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClarifierOutput {
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub goal_summary: String,
    #[serde(default)]
    pub enriched_goal: String,
    #[serde(default)]
    pub is_ready_to_plan: bool,
}

/// Goal-refinement agent.
#[async_trait]
pub trait Clarifier: Send + Sync {
    /// Run one clarification round.
    async fn clarify(&self, ctx: &ClarifyContext) -> Result<ClarifierOutput, AgentError>;

    /// Answer outstanding questions on the user's behalf.
    async fn auto_answer(
        &self,
        ctx: &ClarifyContext,
        questions: &[String],
    ) -> Result<Vec<ClarifyAnswer>, AgentError>;
}

/// One task as proposed by the planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannedTask {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub validation_steps: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub assigned_agent: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expected_files: Vec<String>,
    /// Indices into the task list of tasks that must complete first.
    #[serde(default)]
    pub depends_on: Vec<usize>,
    #[serde(default)]
    pub phase: Option<String>,
}

const fn default_priority() -> u8 {
    50
}

/// Parsed planner result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerOutput {
    pub tasks: Vec<PlannedTask>,
    #[serde(default)]
    pub phases: Vec<String>,
}

/// Plan-generation agent.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        goal: &str,
        enriched_goal: &str,
        context: Option<&str>,
    ) -> Result<PlannerOutput, AgentError>;
}

/// Final status of an audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Verified,
    NeedsRevision,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::NeedsRevision => "needs_revision",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Findings of the final audit pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFindings {
    pub build_passed: bool,
    pub tests_passed: bool,
    #[serde(default)]
    pub semantic_issues: Vec<String>,
}

/// Result of an audit run, including any auto-fix attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub final_status: AuditStatus,
    pub attempts: u32,
    #[serde(default)]
    pub fixes_applied: Vec<String>,
    pub final_audit: AuditFindings,
}

/// Build/test/semantic audit agent.
#[async_trait]
pub trait AuditService: Send + Sync {
    /// Audit a plan's completed work, optionally applying fixes between
    /// attempts. Runs under the caller's deadline.
    async fn audit_with_auto_fix(
        &self,
        plan: &Plan,
        tasks: &[Task],
        auto_fix: bool,
    ) -> Result<AuditOutcome, AgentError>;
}

/// Answer synthesis over retrieved context, used by knowledge `ask`.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(&self, query: &str, context: &str) -> Result<String, AgentError>;
}
