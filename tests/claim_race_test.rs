//! Concurrent claim contention: the repository's conditional update is
//! the linearization point, so exactly one of two racing sessions wins.

mod common;

use std::sync::Arc;

use taskwing::domain::errors::DomainError;
use taskwing::domain::models::TaskStatus;
use taskwing::domain::ports::{PlanRepository, TaskRepository};
use taskwing::infrastructure::database::{PlanRepositoryImpl, TaskRepositoryImpl};

use common::{sample_plan, sample_task, setup_test_db};

#[tokio::test]
async fn exactly_one_of_two_racing_claims_wins() {
    let (pool, _dir) = setup_test_db().await;
    let plans = PlanRepositoryImpl::new(pool.clone());
    let tasks = Arc::new(TaskRepositoryImpl::new(pool));

    let plan = sample_plan("race goal");
    plans.create(&plan).await.expect("create plan");
    let task = sample_task(plan.id, "contested task");
    tasks.create(&task).await.expect("create task");

    let repo_a = tasks.clone();
    let repo_b = tasks.clone();
    let task_id = task.id;

    let (a, b) = tokio::join!(
        tokio::spawn(async move { repo_a.claim(task_id, "session-a").await }),
        tokio::spawn(async move { repo_b.claim(task_id, "session-b").await }),
    );
    let a = a.expect("join a");
    let b = b.expect("join b");

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one claim must win");

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser.unwrap_err(), DomainError::AlreadyClaimed(_)));

    // Stored state belongs to the winner.
    let stored = tasks.get(task_id).await.expect("get").unwrap();
    assert_eq!(stored.status, TaskStatus::InProgress);
    let winner_session = stored.claimed_by.expect("claimed_by set");
    assert!(winner_session == "session-a" || winner_session == "session-b");
    assert!(stored.claimed_at.is_some());
}

#[tokio::test]
async fn many_sessions_racing_one_winner() {
    let (pool, _dir) = setup_test_db().await;
    let plans = PlanRepositoryImpl::new(pool.clone());
    let tasks = Arc::new(TaskRepositoryImpl::new(pool));

    let plan = sample_plan("many racers");
    plans.create(&plan).await.expect("create plan");
    let task = sample_task(plan.id, "popular task");
    tasks.create(&task).await.expect("create task");

    let mut handles = Vec::new();
    for i in 0..8 {
        let repo = tasks.clone();
        let task_id = task.id;
        handles.push(tokio::spawn(async move {
            repo.claim(task_id, &format!("session-{i}")).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("join").is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
