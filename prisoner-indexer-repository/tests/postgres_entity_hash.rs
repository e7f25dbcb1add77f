//! Integration tests for the PostgreSQL dedup hash repository.
//!
//! Run with: `cargo test --test postgres_entity_hash -- --ignored`

use chrono::{Duration, Utc};
use prisoner_indexer_repository::{EntityHashRepository, HashStream, PostgresEntityHashRepository};

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_upsert_reports_changes(pool: sqlx::PgPool) {
    let repository = PostgresEntityHashRepository::new(pool).await.unwrap();
    let now = Utc::now();

    let inserted = repository
        .upsert_if_changed(HashStream::Document, "A1234AA", "hash-1", now)
        .await
        .unwrap();
    let unchanged = repository
        .upsert_if_changed(HashStream::Document, "A1234AA", "hash-1", now)
        .await
        .unwrap();
    let changed = repository
        .upsert_if_changed(HashStream::Document, "A1234AA", "hash-2", now)
        .await
        .unwrap();

    assert_eq!((inserted, unchanged, changed), (1, 0, 1));
    assert_eq!(
        repository
            .get_hash(HashStream::Document, "A1234AA")
            .await
            .unwrap(),
        Some("hash-2".to_string())
    );
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_streams_use_separate_tables(pool: sqlx::PgPool) {
    let repository = PostgresEntityHashRepository::new(pool).await.unwrap();
    let now = Utc::now();

    repository
        .upsert_if_changed(HashStream::Document, "A1234AA", "hash", now)
        .await
        .unwrap();

    assert!(repository
        .get_hash(HashStream::Event, "A1234AA")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_delete_and_retention(pool: sqlx::PgPool) {
    let repository = PostgresEntityHashRepository::new(pool).await.unwrap();
    let now = Utc::now();

    repository
        .upsert_if_changed(HashStream::Event, "A1111AA", "old", now - Duration::days(200))
        .await
        .unwrap();
    repository
        .upsert_if_changed(HashStream::Event, "A2222AA", "new", now)
        .await
        .unwrap();

    let purged = repository
        .delete_older_than(HashStream::Event, now - Duration::days(180))
        .await
        .unwrap();
    assert_eq!(purged, 1);

    assert_eq!(
        repository.delete(HashStream::Event, "A2222AA").await.unwrap(),
        1
    );
    assert_eq!(
        repository.delete(HashStream::Event, "A2222AA").await.unwrap(),
        0
    );
}
