//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod clarify;
pub mod config;
pub mod deviation;
pub mod knowledge;
pub mod plan;
pub mod task;

pub use clarify::{ClarifyAnswer, ClarifySession, ClarifyState, ClarifyTurn};
pub use config::{
    ClarifyConfig, Config, DatabaseConfig, GitConfig, KnowledgeConfig, LoggingConfig,
    ScopeConfig, ScopeDefinition, ScopeOverrides,
};
pub use deviation::{
    Deviation, DeviationType, SentinelReport, Severity, VerificationResult, VerificationStatus,
};
pub use knowledge::{
    CodeSymbol, KnowledgeNode, NodeType, NodeTypeSummary, ProjectSummary, ScoredNode, SymbolKind,
    Visibility,
};
pub use plan::{Phase, Plan, PlanStatus, MAX_GOAL_LEN};
pub use task::{ContextNode, Task, TaskStatus, MAX_PRIORITY, MAX_TITLE_LEN};
