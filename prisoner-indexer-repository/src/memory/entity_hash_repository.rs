use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::errors::RepositoryError;
use crate::interfaces::EntityHashRepository;
use crate::types::HashStream;

#[derive(Debug, Clone)]
struct HashRow {
    hash: String,
    updated_at: DateTime<Utc>,
}

/// In-memory dedup hash store.
///
/// The whole map sits behind one mutex, which gives `upsert_if_changed` the
/// same atomicity as the single-statement SQL upsert.
#[derive(Default)]
pub struct InMemoryEntityHashRepository {
    rows: Mutex<HashMap<(HashStream, String), HashRow>>,
    unavailable: AtomicBool,
}

impl InMemoryEntityHashRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a transient pool timeout until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored rows for a stream.
    pub async fn len(&self, stream: HashStream) -> usize {
        self.rows
            .lock()
            .await
            .keys()
            .filter(|(s, _)| *s == stream)
            .count()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityHashRepository for InMemoryEntityHashRepository {
    async fn upsert_if_changed(
        &self,
        stream: HashStream,
        prisoner_number: &str,
        hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        let key = (stream, prisoner_number.to_string());

        match rows.get_mut(&key) {
            Some(row) if row.hash == hash => Ok(0),
            Some(row) => {
                row.hash = hash.to_string();
                row.updated_at = updated_at;
                Ok(1)
            }
            None => {
                rows.insert(
                    key,
                    HashRow {
                        hash: hash.to_string(),
                        updated_at,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn get_hash(
        &self,
        stream: HashStream,
        prisoner_number: &str,
    ) -> Result<Option<String>, RepositoryError> {
        self.check_available()?;
        Ok(self
            .rows
            .lock()
            .await
            .get(&(stream, prisoner_number.to_string()))
            .map(|row| row.hash.clone()))
    }

    async fn delete(
        &self,
        stream: HashStream,
        prisoner_number: &str,
    ) -> Result<u64, RepositoryError> {
        self.check_available()?;
        let removed = self
            .rows
            .lock()
            .await
            .remove(&(stream, prisoner_number.to_string()));
        Ok(u64::from(removed.is_some()))
    }

    async fn delete_older_than(
        &self,
        stream: HashStream,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        self.check_available()?;
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|(s, _), row| *s != stream || row.updated_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_same_hash_twice_reports_no_change() {
        let repo = InMemoryEntityHashRepository::new();
        let now = Utc::now();

        assert_eq!(
            repo.upsert_if_changed(HashStream::Document, "A1234AA", "h1", now)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            repo.upsert_if_changed(HashStream::Document, "A1234AA", "h1", now)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            repo.upsert_if_changed(HashStream::Document, "A1234AA", "h2", now)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let repo = InMemoryEntityHashRepository::new();
        let now = Utc::now();

        repo.upsert_if_changed(HashStream::Document, "A1234AA", "h1", now)
            .await
            .unwrap();
        let changed = repo
            .upsert_if_changed(HashStream::Event, "A1234AA", "h1", now)
            .await
            .unwrap();

        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn test_delete_older_than_only_touches_stale_rows() {
        let repo = InMemoryEntityHashRepository::new();
        let now = Utc::now();

        repo.upsert_if_changed(HashStream::Event, "A1111AA", "h", now - Duration::days(200))
            .await
            .unwrap();
        repo.upsert_if_changed(HashStream::Event, "A2222AA", "h", now)
            .await
            .unwrap();
        repo.upsert_if_changed(HashStream::Document, "A1111AA", "h", now - Duration::days(200))
            .await
            .unwrap();

        let deleted = repo
            .delete_older_than(HashStream::Event, now - Duration::days(180))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(repo.len(HashStream::Event).await, 1);
        assert_eq!(repo.len(HashStream::Document).await, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_transiently() {
        let repo = InMemoryEntityHashRepository::new();
        repo.set_unavailable(true);

        let err = repo
            .get_hash(HashStream::Document, "A1234AA")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
