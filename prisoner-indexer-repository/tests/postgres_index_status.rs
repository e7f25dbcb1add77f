//! Integration tests for the PostgreSQL index status repository.
//!
//! These tests require a real PostgreSQL database (`DATABASE_URL`) and use the
//! SQLx test macro for per-test databases.
//!
//! Run with: `cargo test --test postgres_index_status -- --ignored`

use chrono::Utc;
use prisoner_indexer_repository::{IndexStatusRepository, PostgresIndexStatusRepository};
use prisoner_indexer_shared::{IndexState, IndexStatus, SyncIndex};

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_get_before_create_is_none(pool: sqlx::PgPool) {
    let repository = PostgresIndexStatusRepository::new(pool).await.unwrap();
    assert!(repository.get().await.unwrap().is_none());
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_get_or_create_is_idempotent(pool: sqlx::PgPool) {
    let repository = PostgresIndexStatusRepository::new(pool).await.unwrap();

    let first = repository.get_or_create().await.unwrap();
    let second = repository.get_or_create().await.unwrap();

    assert_eq!(first, IndexStatus::new_absent());
    assert_eq!(first, second);
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_compare_and_swap_round_trip(pool: sqlx::PgPool) {
    let repository = PostgresIndexStatusRepository::new(pool).await.unwrap();
    let status = repository.get_or_create().await.unwrap();
    let now = Utc::now();

    let stored = repository
        .compare_and_swap(status.version, &status.to_building(now))
        .await
        .unwrap()
        .expect("first writer wins");

    assert_eq!(stored.version, status.version + 1);
    assert_eq!(stored.current_index, SyncIndex::None);
    assert_eq!(stored.other_index_state, IndexState::Building);
    assert!(stored.other_index_start_build_time.is_some());
    assert_eq!(repository.get().await.unwrap(), Some(stored));
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_stale_compare_and_swap_is_rejected(pool: sqlx::PgPool) {
    let repository = PostgresIndexStatusRepository::new(pool).await.unwrap();
    let status = repository.get_or_create().await.unwrap();
    let next = status.to_building(Utc::now());

    assert!(repository
        .compare_and_swap(status.version, &next)
        .await
        .unwrap()
        .is_some());
    assert!(repository
        .compare_and_swap(status.version, &next.to_cancelled(Utc::now()))
        .await
        .unwrap()
        .is_none());

    let stored = repository.get().await.unwrap().unwrap();
    assert_eq!(stored.other_index_state, IndexState::Building);
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_reset_returns_bootstrap_state(pool: sqlx::PgPool) {
    let repository = PostgresIndexStatusRepository::new(pool).await.unwrap();
    let status = repository.get_or_create().await.unwrap();
    repository
        .compare_and_swap(status.version, &status.to_building(Utc::now()))
        .await
        .unwrap();

    let reset = repository.reset().await.unwrap();

    assert_eq!(reset.current_index, SyncIndex::None);
    assert_eq!(reset.other_index_state, IndexState::Absent);
    assert_eq!(reset.version, status.version + 2);
}
