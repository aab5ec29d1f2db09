//! Clarify session repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ClarifySession, ClarifyTurn};

/// Repository interface for clarify sessions and their turns.
#[async_trait]
pub trait ClarifyRepository: Send + Sync {
    /// Create a new session.
    async fn create_session(&self, session: &ClarifySession) -> DomainResult<()>;

    /// Get a session by ID.
    async fn get_session(&self, id: Uuid) -> DomainResult<Option<ClarifySession>>;

    /// Update a session row from the given model.
    async fn update_session(&self, session: &ClarifySession) -> DomainResult<()>;

    /// Append a turn to a session's history.
    async fn append_turn(&self, turn: &ClarifyTurn) -> DomainResult<()>;

    /// List a session's turns ordered by round.
    async fn list_turns(&self, session_id: Uuid) -> DomainResult<Vec<ClarifyTurn>>;
}
