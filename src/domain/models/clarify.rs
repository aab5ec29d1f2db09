//! Clarify session domain model.
//!
//! A clarify session is a multi-round interactive refinement of a goal
//! into an executable specification. Each round's questions and the
//! answers supplied before the next round are captured as turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;

/// State of a clarify session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarifyState {
    /// Session created, no round run yet
    New,
    /// Questions are outstanding
    AwaitingAnswers,
    /// Clarification resolved, plan generation unblocked
    ReadyToPlan,
    /// Round budget exhausted without resolution
    MaxRoundsExceeded,
}

impl Default for ClarifyState {
    fn default() -> Self {
        Self::New
    }
}

impl ClarifyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::AwaitingAnswers => "awaiting_answers",
            Self::ReadyToPlan => "ready_to_plan",
            Self::MaxRoundsExceeded => "max_rounds_exceeded",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "new" => Some(Self::New),
            "awaiting_answers" => Some(Self::AwaitingAnswers),
            "ready_to_plan" => Some(Self::ReadyToPlan),
            "max_rounds_exceeded" => Some(Self::MaxRoundsExceeded),
            _ => None,
        }
    }
}

impl std::str::FromStr for ClarifyState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown clarify state: {s}")))
    }
}

impl std::fmt::Display for ClarifyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question and the answer supplied for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyAnswer {
    pub question: String,
    pub answer: String,
}

/// One round of a clarify session: the questions asked and the answers
/// supplied before the next round ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarifyTurn {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Round this turn belongs to, 1-based.
    pub round_index: u32,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub answers: Vec<ClarifyAnswer>,
    pub created_at: DateTime<Utc>,
}

/// A multi-round refinement of a goal into an executable specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarifySession {
    pub id: Uuid,
    pub goal: String,
    #[serde(default)]
    pub enriched_goal: String,
    #[serde(default)]
    pub goal_summary: String,
    #[serde(default)]
    pub state: ClarifyState,
    /// Rounds completed so far. Never exceeds `max_rounds`.
    pub round_index: u32,
    pub max_rounds: u32,
    pub max_questions_per_round: u32,
    #[serde(default)]
    pub current_questions: Vec<String>,
    #[serde(default)]
    pub is_ready_to_plan: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClarifySession {
    /// Create a fresh session for a goal with the given round budget.
    pub fn new(goal: impl Into<String>, max_rounds: u32, max_questions_per_round: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            goal: goal.into(),
            enriched_goal: String::new(),
            goal_summary: String::new(),
            state: ClarifyState::New,
            round_index: 0,
            max_rounds,
            max_questions_per_round,
            current_questions: Vec::new(),
            is_ready_to_plan: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the round budget has been used up.
    pub fn rounds_exhausted(&self) -> bool {
        self.round_index >= self.max_rounds
    }
}
