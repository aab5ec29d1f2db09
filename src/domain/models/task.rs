//! Task domain model.
//!
//! Tasks are discrete units of work within a plan. They carry the
//! predicted file-modification set, acceptance criteria, and the
//! claim/completion bookkeeping the coordinator relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Maximum length of a task title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum task priority.
pub const MAX_PRIORITY: u8 = 100;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is sketched but not yet part of the executable set
    Draft,
    /// Task is defined, waiting for dependencies or a claim
    Pending,
    /// Task is explicitly staged for pickup
    Ready,
    /// Task is claimed by a session and being worked on
    InProgress,
    /// Completion reported, deviation analysis running
    Verifying,
    /// Task finished successfully
    Completed,
    /// Task failed
    Failed,
    /// Task is blocked by failed dependencies
    Blocked,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "in_progress" => Some(Self::InProgress),
            "verifying" => Some(Self::Verifying),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a session may claim a task in this status.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending | Self::Ready)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Draft => &[Self::Pending, Self::Ready],
            Self::Pending => &[Self::Ready, Self::InProgress, Self::Blocked],
            Self::Ready => &[Self::InProgress, Self::Pending, Self::Blocked],
            Self::InProgress => &[Self::Verifying, Self::Completed, Self::Failed, Self::Pending],
            Self::Verifying => &[Self::Completed, Self::Failed],
            Self::Blocked => &[Self::Pending, Self::Ready, Self::Failed],
            Self::Completed => &[],
            Self::Failed => &[Self::Pending], // Can retry
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown task status: {s}")))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question/answer pair captured during clarification or used as a
/// knowledge pointer attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNode {
    pub node_id: Uuid,
    #[serde(default)]
    pub summary: String,
}

/// A unit of work with acceptance criteria, validation steps, and a
/// predicted file-modification set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub plan_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<Uuid>,
    /// Short imperative title, 1..=200 characters.
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Scheduling weight in `[0, 100]`, higher runs earlier.
    pub priority: u8,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub suggested_recall_queries: Vec<String>,
    /// Early-bound context produced at generation time.
    #[serde(default)]
    pub context_summary: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub validation_steps: Vec<String>,
    /// Files the plan predicts this task will touch.
    #[serde(default)]
    pub expected_files: Vec<String>,
    /// Files already dirty in the working tree at claim time. Written once.
    #[serde(default)]
    pub git_baseline: Vec<String>,
    /// Files the agent reported as modified at completion.
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub completion_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Task ids within the same plan that must complete first.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub context_nodes: Vec<ContextNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task under the given plan.
    pub fn new(plan_id: Uuid, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            plan_id,
            phase_id: None,
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority: 50,
            scope: String::new(),
            keywords: Vec::new(),
            suggested_recall_queries: Vec::new(),
            context_summary: String::new(),
            acceptance_criteria: Vec::new(),
            validation_steps: Vec::new(),
            expected_files: Vec::new(),
            git_baseline: Vec::new(),
            files_modified: Vec::new(),
            completion_summary: String::new(),
            claimed_by: None,
            claimed_at: None,
            completed_at: None,
            dependencies: Vec::new(),
            context_nodes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the title length constraint (1..=200 characters).
    pub fn validate_title(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "task title must not be empty".to_string(),
            ));
        }
        let len = self.title.chars().count();
        if len > MAX_TITLE_LEN {
            return Err(DomainError::ValidationFailed(format!(
                "task title is {len} characters, maximum is {MAX_TITLE_LEN}"
            )));
        }
        Ok(())
    }

    /// Validate the description is non-empty.
    pub fn validate_description(&self) -> DomainResult<()> {
        if self.description.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "task description must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate the priority bound (0..=100).
    pub fn validate_priority(&self) -> DomainResult<()> {
        if self.priority > MAX_PRIORITY {
            return Err(DomainError::ValidationFailed(format!(
                "task priority {} is out of range 0..={MAX_PRIORITY}",
                self.priority
            )));
        }
        Ok(())
    }

    /// Run all field validations.
    pub fn validate(&self) -> DomainResult<()> {
        self.validate_title()?;
        self.validate_description()?;
        self.validate_priority()?;
        Ok(())
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Claim-state invariant: in_progress requires claim bookkeeping.
    pub fn claim_invariant_holds(&self) -> bool {
        if self.status != TaskStatus::InProgress {
            return true;
        }
        self.claimed_by.as_deref().is_some_and(|s| !s.is_empty()) && self.claimed_at.is_some()
    }
}
