//! Placeholder agent adapters.
//!
//! The daemon wires these in when no LLM provider adapter has been
//! plugged. Every invocation reports the agent as unavailable with a
//! pointer to the configuration, so the coordinators surface an
//! actionable message instead of hanging.

use async_trait::async_trait;

use crate::domain::models::{ClarifyAnswer, Plan, Task};
use crate::domain::ports::{
    AgentError, AuditOutcome, AuditService, Clarifier, ClarifierOutput, ClarifyContext, Planner,
    PlannerOutput,
};

/// Stand-in for a missing clarifier adapter.
pub struct UnconfiguredClarifier;

#[async_trait]
impl Clarifier for UnconfiguredClarifier {
    async fn clarify(&self, _ctx: &ClarifyContext) -> Result<ClarifierOutput, AgentError> {
        Err(AgentError::Unavailable(
            "no clarifier adapter configured; install an LLM provider adapter".to_string(),
        ))
    }

    async fn auto_answer(
        &self,
        _ctx: &ClarifyContext,
        _questions: &[String],
    ) -> Result<Vec<ClarifyAnswer>, AgentError> {
        Err(AgentError::Unavailable(
            "no clarifier adapter configured; install an LLM provider adapter".to_string(),
        ))
    }
}

/// Stand-in for a missing planner adapter.
pub struct UnconfiguredPlanner;

#[async_trait]
impl Planner for UnconfiguredPlanner {
    async fn plan(
        &self,
        _goal: &str,
        _enriched_goal: &str,
        _context: Option<&str>,
    ) -> Result<PlannerOutput, AgentError> {
        Err(AgentError::Unavailable(
            "no planner adapter configured; install an LLM provider adapter".to_string(),
        ))
    }
}

/// Stand-in for a missing audit adapter.
pub struct UnconfiguredAuditService;

#[async_trait]
impl AuditService for UnconfiguredAuditService {
    async fn audit_with_auto_fix(
        &self,
        _plan: &Plan,
        _tasks: &[Task],
        _auto_fix: bool,
    ) -> Result<AuditOutcome, AgentError> {
        Err(AgentError::Unavailable(
            "no audit adapter configured; install an LLM provider adapter".to_string(),
        ))
    }
}
