use thiserror::Error;
use uuid::Uuid;

use crate::domain::errors::DomainError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("UUID parse error: {0}")]
    UuidParseError(#[from] uuid::Error),

    #[error("DateTime parse error: {0}")]
    DateTimeParseError(#[from] chrono::ParseError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(Uuid),

    #[error("Already claimed: {0}")]
    AlreadyClaimed(Uuid),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Migration failed: {0}")]
    MigrationError(String),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<DatabaseError> for DomainError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(id) => DomainError::TaskNotFound(id),
            DatabaseError::AlreadyClaimed(id) => DomainError::AlreadyClaimed(id),
            DatabaseError::InvalidTransition { from, to } => {
                DomainError::InvalidTransition { from, to }
            }
            DatabaseError::ConstraintViolation(msg) => DomainError::ConstraintViolation(msg),
            DatabaseError::JsonError(e) => DomainError::SerializationError(e.to_string()),
            other => DomainError::DatabaseError(other.to_string()),
        }
    }
}
