use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::RepositoryError;
use crate::interfaces::IndexStatusRepository;
use prisoner_indexer_shared::IndexStatus;

/// In-memory index status record with compare-and-swap semantics.
#[derive(Default)]
pub struct InMemoryIndexStatusRepository {
    status: Mutex<Option<IndexStatus>>,
    forced_conflicts: AtomicUsize,
}

impl InMemoryIndexStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record.
    pub fn with_status(status: IndexStatus) -> Self {
        Self {
            status: Mutex::new(Some(status)),
            forced_conflicts: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` compare-and-swap calls lose, as if another writer
    /// got there first. The stored version is bumped each time.
    pub fn force_conflicts(&self, count: usize) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl IndexStatusRepository for InMemoryIndexStatusRepository {
    async fn get(&self) -> Result<Option<IndexStatus>, RepositoryError> {
        Ok(self.status.lock().await.clone())
    }

    async fn get_or_create(&self) -> Result<IndexStatus, RepositoryError> {
        let mut status = self.status.lock().await;
        Ok(status.get_or_insert_with(IndexStatus::new_absent).clone())
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        next: &IndexStatus,
    ) -> Result<Option<IndexStatus>, RepositoryError> {
        let mut status = self.status.lock().await;
        let Some(stored) = status.as_mut() else {
            return Ok(None);
        };

        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            stored.version += 1;
            return Ok(None);
        }

        if stored.version != expected_version {
            return Ok(None);
        }

        *stored = IndexStatus {
            version: expected_version + 1,
            ..next.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn reset(&self) -> Result<IndexStatus, RepositoryError> {
        let mut status = self.status.lock().await;
        let version = status.as_ref().map(|s| s.version + 1).unwrap_or(0);
        let fresh = IndexStatus {
            version,
            ..IndexStatus::new_absent()
        };
        *status = Some(fresh.clone());
        Ok(fresh)
    }
}
