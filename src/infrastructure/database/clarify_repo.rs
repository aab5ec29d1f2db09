//! SQLite implementation of the clarify session repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ClarifyAnswer, ClarifySession, ClarifyTurn};
use crate::domain::ports::ClarifyRepository;
use crate::infrastructure::database::utils::{decode_json, encode_json, parse_datetime};

/// SQLite implementation of `ClarifyRepository` using sqlx.
pub struct ClarifyRepositoryImpl {
    pool: SqlitePool,
}

impl ClarifyRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_session(row: &SqliteRow) -> DomainResult<ClarifySession> {
        let state: String = row.get("state");
        Ok(ClarifySession {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            goal: row.get("goal"),
            enriched_goal: row.get("enriched_goal"),
            goal_summary: row.get("goal_summary"),
            state: state.parse()?,
            round_index: u32::try_from(row.get::<i64, _>("round_index")).unwrap_or_default(),
            max_rounds: u32::try_from(row.get::<i64, _>("max_rounds")).unwrap_or_default(),
            max_questions_per_round: u32::try_from(row.get::<i64, _>("max_questions_per_round"))
                .unwrap_or_default(),
            current_questions: decode_json(row.get("current_questions"))?,
            is_ready_to_plan: row.get::<i64, _>("is_ready_to_plan") != 0,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }

    fn row_to_turn(row: &SqliteRow) -> DomainResult<ClarifyTurn> {
        Ok(ClarifyTurn {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            session_id: Uuid::parse_str(row.get::<String, _>("session_id").as_str())?,
            round_index: u32::try_from(row.get::<i64, _>("round_index")).unwrap_or_default(),
            questions: decode_json(row.get("questions"))?,
            answers: decode_json::<Vec<ClarifyAnswer>>(row.get("answers"))?,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
        })
    }
}

#[async_trait]
impl ClarifyRepository for ClarifyRepositoryImpl {
    async fn create_session(&self, session: &ClarifySession) -> DomainResult<()> {
        sqlx::query(
            r"
            INSERT INTO clarify_sessions (
                id, goal, enriched_goal, goal_summary, state, round_index,
                max_rounds, max_questions_per_round, current_questions,
                is_ready_to_plan, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(session.id.to_string())
        .bind(&session.goal)
        .bind(&session.enriched_goal)
        .bind(&session.goal_summary)
        .bind(session.state.as_str())
        .bind(i64::from(session.round_index))
        .bind(i64::from(session.max_rounds))
        .bind(i64::from(session.max_questions_per_round))
        .bind(encode_json(&session.current_questions)?)
        .bind(i64::from(session.is_ready_to_plan))
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> DomainResult<Option<ClarifySession>> {
        let row = sqlx::query("SELECT * FROM clarify_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn update_session(&self, session: &ClarifySession) -> DomainResult<()> {
        let result = sqlx::query(
            r"
            UPDATE clarify_sessions SET
                enriched_goal = ?, goal_summary = ?, state = ?, round_index = ?,
                current_questions = ?, is_ready_to_plan = ?, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(&session.enriched_goal)
        .bind(&session.goal_summary)
        .bind(session.state.as_str())
        .bind(i64::from(session.round_index))
        .bind(encode_json(&session.current_questions)?)
        .bind(i64::from(session.is_ready_to_plan))
        .bind(Utc::now().to_rfc3339())
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SessionNotFound(session.id));
        }
        Ok(())
    }

    async fn append_turn(&self, turn: &ClarifyTurn) -> DomainResult<()> {
        sqlx::query(
            r"
            INSERT INTO clarify_turns (id, session_id, round_index, questions, answers, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(turn.id.to_string())
        .bind(turn.session_id.to_string())
        .bind(i64::from(turn.round_index))
        .bind(encode_json(&turn.questions)?)
        .bind(encode_json(&turn.answers)?)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_turns(&self, session_id: Uuid) -> DomainResult<Vec<ClarifyTurn>> {
        let rows = sqlx::query(
            "SELECT * FROM clarify_turns WHERE session_id = ? ORDER BY round_index, created_at",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_turn).collect()
    }
}
