//! Domain ports (interfaces) for the TaskWing engine.

pub mod agents;
pub mod clarify_repository;
pub mod embedding;
pub mod knowledge_repository;
pub mod plan_repository;
pub mod task_repository;

pub use agents::{
    AgentError, AnswerSynthesizer, AuditFindings, AuditOutcome, AuditService, AuditStatus,
    Clarifier, ClarifierOutput, ClarifyContext, PlannedTask, Planner, PlannerOutput,
};
pub use clarify_repository::ClarifyRepository;
pub use embedding::Embedder;
pub use knowledge_repository::KnowledgeRepository;
pub use plan_repository::PlanRepository;
pub use task_repository::TaskRepository;
