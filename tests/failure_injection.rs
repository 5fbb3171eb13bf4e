//! Failure injection: constraint violations, breaker trips, rollbacks.

use resilient_store::error::ErrorKind;
use resilient_store::handler::CreateUserRequest;
use resilient_store::idempotency::{IdempotencyRecord, RecordStore};
use resilient_store::repository::StoreError;
use resilient_store::resilience::{Rejection, State};
use resilient_store::Context;

mod common;

fn record(id: i64, reference_id: i64) -> IdempotencyRecord {
    IdempotencyRecord {
        id,
        request_type: "create_user".to_string(),
        reference_id,
        response_data: "{}".to_string(),
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_duplicate_primary_key_is_surfaced() {
    let t = common::start_app(|_| {}).await;
    let ctx = Context::background();
    let uow = t.db().unit_of_work_factory.begin().await.unwrap();

    let user = common::sample_user(1);
    uow.users().insert(&ctx, &user).await.unwrap();
    let err = uow.users().insert(&ctx, &user).await.unwrap_err();

    assert!(err.is_unique_violation(), "unexpected error: {err}");
    assert!(!err.is_transient());
    uow.abort().await.unwrap();
}

#[tokio::test]
async fn test_racing_record_insert_fails_on_uniqueness() {
    let t = common::start_app(|_| {}).await;
    let ctx = Context::background();
    let factory = &t.db().unit_of_work_factory;

    let loser = factory.begin().await.unwrap();
    let winner = factory.begin().await.unwrap();
    winner.idempotency_records().insert(&ctx, &record(77, 1)).await.unwrap();
    winner.commit().await.unwrap();

    let err = loser
        .idempotency_records()
        .insert(&ctx, &record(77, 2))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
    loser.abort().await.unwrap();

    assert_eq!(t.count("idempotency_records").await, 1);
}

#[tokio::test]
async fn test_aborted_writes_are_not_visible() {
    let t = common::start_app(|_| {}).await;
    let ctx = Context::background();
    let factory = &t.db().unit_of_work_factory;

    let uow = factory.begin().await.unwrap();
    uow.users().insert(&ctx, &common::sample_user(5)).await.unwrap();
    assert!(uow.users().get(&ctx, 5).await.unwrap().is_some());
    uow.abort().await.unwrap();

    let uow = factory.begin().await.unwrap();
    assert!(uow.users().get(&ctx, 5).await.unwrap().is_none());
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn test_dropped_unit_of_work_rolls_back() {
    let t = common::start_app(|_| {}).await;
    let ctx = Context::background();
    let factory = &t.db().unit_of_work_factory;

    {
        let uow = factory.begin().await.unwrap();
        uow.users().insert(&ctx, &common::sample_user(6)).await.unwrap();
    }

    let uow = factory.begin().await.unwrap();
    assert!(uow.users().get(&ctx, 6).await.unwrap().is_none());
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn test_repositories_are_built_once_per_unit_of_work() {
    let t = common::start_app(|_| {}).await;
    let uow = t.db().unit_of_work_factory.begin().await.unwrap();

    assert!(std::ptr::eq(uow.users(), uow.users()));
    assert!(std::ptr::eq(uow.ledgers(), uow.ledgers()));
    assert!(std::ptr::eq(uow.idempotency_records(), uow.idempotency_records()));
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn test_breaker_opens_on_permanent_failure_and_rejects_calls() {
    let t = common::start_app(|config| {
        config.circuit_breaker.consecutive_failures = 0;
        config.circuit_breaker.timeout_secs = 3600;
    })
    .await;
    let ctx = Context::background();
    let breaker = t.db().breaker.clone();

    let uow = t.db().unit_of_work_factory.begin().await.unwrap();
    let user = common::sample_user(1);
    uow.users().insert(&ctx, &user).await.unwrap();
    assert_eq!(breaker.state(), State::Closed);

    let err = uow.users().insert(&ctx, &user).await.unwrap_err();
    assert!(err.is_unique_violation());
    assert_eq!(breaker.state(), State::Open);

    let rejected = uow.users().get(&ctx, 1).await.unwrap_err();
    match rejected {
        StoreError::CircuitOpen(rejection) => {
            assert_eq!(rejection.breaker, "sqlite");
            assert_eq!(rejection.reason, Rejection::Open);
        }
        other => panic!("expected breaker rejection, got {other}"),
    }
    uow.abort().await.unwrap();

    // the whole request path fails fast while open
    let err = t
        .app
        .users
        .create_user(
            &ctx,
            CreateUserRequest {
                idempotency_id: 10,
                email: "eve@example.com".to_string(),
                username: "eve".to_string(),
                password: "secret".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(t.count("users").await, 1);
}

#[tokio::test]
async fn test_commit_is_final() {
    let t = common::start_app(|_| {}).await;
    let ctx = Context::background();
    let factory = &t.db().unit_of_work_factory;

    let uow = factory.begin().await.unwrap();
    uow.users().insert(&ctx, &common::sample_user(8)).await.unwrap();
    uow.commit().await.unwrap();

    let uow = factory.begin().await.unwrap();
    let user = uow.users().get(&ctx, 8).await.unwrap().unwrap();
    uow.abort().await.unwrap();
    assert_eq!(user.username, "user8");
}

#[tokio::test]
async fn test_failed_commit_is_surfaced_and_persists_nothing() {
    let t = common::start_app(|_| {}).await;

    // every new user gets an audit row pointing at a parent that never exists;
    // the deferred foreign key only fails at COMMIT
    for statement in [
        "CREATE TABLE main.audit_parents (id INTEGER PRIMARY KEY)",
        "CREATE TABLE main.user_audit (
            user_id INTEGER NOT NULL
                REFERENCES audit_parents (id) DEFERRABLE INITIALLY DEFERRED
        )",
        "CREATE TRIGGER main.users_audit AFTER INSERT ON users
         BEGIN
            INSERT INTO user_audit (user_id) VALUES (NEW.id);
         END",
    ] {
        sqlx::query(statement).execute(t.pool()).await.unwrap();
    }

    let err = t
        .app
        .users
        .create_user(
            &Context::background(),
            CreateUserRequest {
                idempotency_id: 31,
                email: "mallory@example.com".to_string(),
                username: "mallory".to_string(),
                password: "secret".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal, "unexpected error: {err}");
    assert_eq!(t.count("users").await, 0);
    assert_eq!(t.count("idempotency_records").await, 0);
    assert_eq!(t.count("user_audit").await, 0);
    assert_eq!(t.db().breaker.state(), State::Closed);
}
