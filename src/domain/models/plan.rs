//! Plan domain model.
//!
//! A plan is a refined goal broken into an ordered set of tasks.
//! At most one plan per repository is active at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Maximum length of a plan goal, in characters.
pub const MAX_GOAL_LEN: usize = 100;

/// Status of a plan in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Plan has been generated but not activated
    Draft,
    /// Plan is the single active plan for the repository
    Active,
    /// All tasks finished, audit not yet run or inconclusive
    Completed,
    /// Audit passed
    Verified,
    /// Audit found issues that need another pass
    NeedsRevision,
    /// Plan retired from view
    Archived,
}

impl Default for PlanStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Verified => "verified",
            Self::NeedsRevision => "needs_revision",
            Self::Archived => "archived",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "verified" => Some(Self::Verified),
            "needs_revision" => Some(Self::NeedsRevision),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Whether the plan is in a state where tasks can be claimed.
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Active | Self::NeedsRevision)
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown plan status: {s}")))
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named stage of a plan grouping related tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Position within the plan, 0-based.
    pub order: u32,
}

/// A refined goal with its ordered task breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    /// Short goal statement, at most [`MAX_GOAL_LEN`] characters.
    pub goal: String,
    /// Full specification produced by clarification.
    #[serde(default)]
    pub enriched_goal: String,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub phases: Vec<Phase>,
    /// Provenance link to the clarify session this plan was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarify_session_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_audit_status: Option<String>,
    /// Raw audit report JSON from the most recent audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_audit_report: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Create a new draft plan for the given goal.
    pub fn new(goal: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            goal: goal.into(),
            enriched_goal: String::new(),
            status: PlanStatus::Draft,
            phases: Vec::new(),
            clarify_session_id: None,
            pr_url: None,
            last_audit_status: None,
            last_audit_report: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the goal length constraint.
    pub fn validate_goal(&self) -> DomainResult<()> {
        if self.goal.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "plan goal must not be empty".to_string(),
            ));
        }
        let len = self.goal.chars().count();
        if len > MAX_GOAL_LEN {
            return Err(DomainError::ValidationFailed(format!(
                "plan goal is {len} characters, maximum is {MAX_GOAL_LEN}"
            )));
        }
        Ok(())
    }

    /// Short suffix of the plan id used in branch names.
    pub fn short_id(&self) -> String {
        let simple = self.id.simple().to_string();
        simple[simple.len() - 8..].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_within_limit_is_accepted() {
        let plan = Plan::new("a".repeat(100));
        assert!(plan.validate_goal().is_ok());
    }

    #[test]
    fn goal_over_limit_is_rejected() {
        let plan = Plan::new("a".repeat(101));
        assert!(plan.validate_goal().is_err());
    }

    #[test]
    fn empty_goal_is_rejected() {
        let plan = Plan::new("   ");
        assert!(plan.validate_goal().is_err());
    }

    #[test]
    fn short_id_is_eight_chars() {
        let plan = Plan::new("goal");
        assert_eq!(plan.short_id().len(), 8);
    }

    #[test]
    fn status_round_trips() {
        for status in [
            PlanStatus::Draft,
            PlanStatus::Active,
            PlanStatus::Completed,
            PlanStatus::Verified,
            PlanStatus::NeedsRevision,
            PlanStatus::Archived,
        ] {
            assert_eq!(PlanStatus::from_str(status.as_str()), Some(status));
        }
    }
}
