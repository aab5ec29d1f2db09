//! Domain errors for the TaskWing workflow engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors surfaced by repositories and coordinators.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Plan not found: {0}")]
    PlanNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Clarify session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Task {0} is already claimed")]
    AlreadyClaimed(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Task dependency cycle detected involving task: {0}")]
    DependencyCycle(Uuid),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::SerializationError(format!("invalid uuid: {err}"))
    }
}

impl From<chrono::ParseError> for DomainError {
    fn from(err: chrono::ParseError) -> Self {
        DomainError::SerializationError(format!("invalid timestamp: {err}"))
    }
}
