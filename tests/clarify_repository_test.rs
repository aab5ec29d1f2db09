mod common;

use chrono::Utc;
use uuid::Uuid;

use taskwing::domain::models::{ClarifyAnswer, ClarifySession, ClarifyState, ClarifyTurn};
use taskwing::domain::ports::ClarifyRepository;
use taskwing::infrastructure::database::ClarifyRepositoryImpl;

use common::setup_test_db;

fn turn(session_id: Uuid, round: u32, questions: &[&str], answers: &[(&str, &str)]) -> ClarifyTurn {
    ClarifyTurn {
        id: Uuid::new_v4(),
        session_id,
        round_index: round,
        questions: questions.iter().map(ToString::to_string).collect(),
        answers: answers
            .iter()
            .map(|(q, a)| ClarifyAnswer {
                question: (*q).to_string(),
                answer: (*a).to_string(),
            })
            .collect(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn session_round_trips() {
    let (pool, _dir) = setup_test_db().await;
    let repo = ClarifyRepositoryImpl::new(pool);

    let session = ClarifySession::new("refine this goal", 5, 3);
    repo.create_session(&session).await.expect("create");

    let retrieved = repo
        .get_session(session.id)
        .await
        .expect("get")
        .expect("session exists");
    assert_eq!(retrieved.goal, "refine this goal");
    assert_eq!(retrieved.state, ClarifyState::New);
    assert_eq!(retrieved.max_rounds, 5);
    assert_eq!(retrieved.max_questions_per_round, 3);
    assert!(!retrieved.is_ready_to_plan);
}

#[tokio::test]
async fn session_updates_persist() {
    let (pool, _dir) = setup_test_db().await;
    let repo = ClarifyRepositoryImpl::new(pool);

    let mut session = ClarifySession::new("goal", 5, 3);
    repo.create_session(&session).await.expect("create");

    session.round_index = 2;
    session.state = ClarifyState::ReadyToPlan;
    session.is_ready_to_plan = true;
    session.enriched_goal = "the full spec".to_string();
    session.goal_summary = "short".to_string();
    repo.update_session(&session).await.expect("update");

    let retrieved = repo.get_session(session.id).await.expect("get").unwrap();
    assert_eq!(retrieved.state, ClarifyState::ReadyToPlan);
    assert!(retrieved.is_ready_to_plan);
    assert_eq!(retrieved.enriched_goal, "the full spec");
    assert_eq!(retrieved.round_index, 2);
}

#[tokio::test]
async fn turns_list_in_round_order() {
    let (pool, _dir) = setup_test_db().await;
    let repo = ClarifyRepositoryImpl::new(pool);

    let session = ClarifySession::new("goal", 5, 3);
    repo.create_session(&session).await.expect("create");

    repo.append_turn(&turn(session.id, 2, &["Q2?"], &[("Q1?", "A1")]))
        .await
        .expect("append turn 2");
    repo.append_turn(&turn(session.id, 1, &["Q1?"], &[]))
        .await
        .expect("append turn 1");

    let turns = repo.list_turns(session.id).await.expect("list");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].round_index, 1);
    assert_eq!(turns[1].round_index, 2);
    assert_eq!(turns[0].questions, vec!["Q1?".to_string()]);
    assert_eq!(turns[1].answers[0].answer, "A1");
}

#[tokio::test]
async fn missing_session_is_none() {
    let (pool, _dir) = setup_test_db().await;
    let repo = ClarifyRepositoryImpl::new(pool);

    let result = repo.get_session(Uuid::new_v4()).await.expect("query");
    assert!(result.is_none());
}
