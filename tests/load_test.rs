//! Concurrent duplicate requests.

use std::sync::Arc;

use resilient_store::handler::CreateUserRequest;
use resilient_store::resilience::State;
use resilient_store::{Context, Error};

mod common;

fn request(idempotency_id: i64, username: &str) -> CreateUserRequest {
    CreateUserRequest {
        idempotency_id,
        email: format!("{username}@example.com"),
        username: username.to_string(),
        password: "secret".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serialized_duplicates_replay_the_winner() {
    let t = Arc::new(common::start_app(|config| config.database.max_connections = 1).await);

    let handles: Vec<_> = ["alice", "bob", "carol", "dave"]
        .into_iter()
        .map(|name| {
            let t = t.clone();
            tokio::spawn(async move {
                t.app
                    .users
                    .create_user(&Context::background(), request(500, name))
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(t.count("users").await, 1);
    assert_eq!(t.count("idempotency_records").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_duplicates_never_duplicate_the_entity() {
    let t = Arc::new(common::start_app(|config| config.database.max_connections = 4).await);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let t = t.clone();
            tokio::spawn(async move {
                t.app
                    .users
                    .create_user(&Context::background(), request(900, &format!("racer{i}")))
                    .await
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let winner = outcomes
        .iter()
        .find_map(|outcome| outcome.as_ref().ok())
        .cloned()
        .expect("one request must succeed");
    for outcome in &outcomes {
        match outcome {
            Ok(user) => assert_eq!(user, &winner),
            Err(Error::Store(err)) => assert!(err.is_unique_violation(), "unexpected error: {err}"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(t.count("users").await, 1);
    assert_eq!(t.count("idempotency_records").await, 1);
    assert_eq!(t.db().breaker.state(), State::Closed);

    // the breaker still admits unrelated work
    t.app
        .users
        .create_user(&Context::background(), request(901, "bystander"))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_requests_all_succeed() {
    let t = Arc::new(common::start_app(|config| config.database.max_connections = 1).await);

    let handles: Vec<_> = (1..=20)
        .map(|i| {
            let t = t.clone();
            tokio::spawn(async move {
                t.app
                    .users
                    .create_user(&Context::background(), request(i, &format!("user{i}")))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(t.count("users").await, 20);
    assert_eq!(t.count("idempotency_records").await, 20);
}
