//! Blue/green index lifecycle.
//!
//! [`IndexLifecycleManager`] owns every transition of the singleton
//! [`IndexStatus`] record. Each transition reads the record, checks its guard,
//! and stores the next record through compare-and-swap on the record version.
//! A writer that loses the swap re-reads and re-checks instead of applying a
//! stale transition. Document store side effects (recreating the other index,
//! repointing the alias) run after a won swap; if they fail the record is
//! swapped back.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::errors::LifecycleError;
use prisoner_indexer_repository::{DocumentIndexProvider, IndexStatusRepository};
use prisoner_indexer_shared::{IndexState, IndexStatus, SyncIndex};

/// Attempts made when the status record keeps changing underneath a transition.
const DEFAULT_MAX_SWAP_ATTEMPTS: usize = 5;

pub struct IndexLifecycleManager {
    statuses: Arc<dyn IndexStatusRepository>,
    documents: Arc<dyn DocumentIndexProvider>,
    complete_threshold: u64,
    max_swap_attempts: usize,
}

impl IndexLifecycleManager {
    /// Create a manager.
    ///
    /// # Arguments
    ///
    /// * `statuses` - Store of the status record
    /// * `documents` - Document store holding both physical indices
    /// * `complete_threshold` - Minimum document count before a build may complete
    pub fn new(
        statuses: Arc<dyn IndexStatusRepository>,
        documents: Arc<dyn DocumentIndexProvider>,
        complete_threshold: u64,
    ) -> Self {
        Self {
            statuses,
            documents,
            complete_threshold,
            max_swap_attempts: DEFAULT_MAX_SWAP_ATTEMPTS,
        }
    }

    pub fn with_max_swap_attempts(mut self, attempts: usize) -> Self {
        self.max_swap_attempts = attempts.max(1);
        self
    }

    pub fn complete_threshold(&self) -> u64 {
        self.complete_threshold
    }

    /// The current status record, created on first use.
    pub async fn status(&self) -> Result<IndexStatus, LifecycleError> {
        Ok(self.statuses.get_or_create().await?)
    }

    /// Indices that currently receive document writes, current first.
    pub async fn active_indices(&self) -> Result<Vec<SyncIndex>, LifecycleError> {
        Ok(self.status().await?.active_indices())
    }

    /// Start a rebuild of the other index.
    ///
    /// The other index is dropped and recreated with a fresh mapping.
    #[instrument(skip(self))]
    pub async fn prepare_for_rebuild(&self) -> Result<IndexStatus, LifecycleError> {
        for _ in 0..self.max_swap_attempts {
            let current = self.status().await?;
            if current.is_building() {
                return Err(LifecycleError::BuildAlreadyInProgress(current));
            }

            let Some(stored) = self.swap(&current, current.to_building(Utc::now())).await? else {
                continue;
            };

            let target = stored.other_index();
            let recreated = async {
                self.documents.delete_index(target).await?;
                self.documents.create_index(target).await
            }
            .await;
            if let Err(e) = recreated {
                self.revert(&stored, &current).await;
                return Err(e.into());
            }

            info!(index = ?target, "Rebuild started");
            return Ok(stored);
        }
        Err(LifecycleError::ConcurrentModification(self.max_swap_attempts))
    }

    /// Complete the rebuild and point the alias at the rebuilt index.
    ///
    /// Unless `ignore_threshold` is set the rebuilt index must hold at least the
    /// configured number of documents.
    #[instrument(skip(self))]
    pub async fn mark_complete(&self, ignore_threshold: bool) -> Result<IndexStatus, LifecycleError> {
        for _ in 0..self.max_swap_attempts {
            let current = self.status().await?;
            if !current.is_building() {
                return Err(LifecycleError::BuildNotInProgress(current));
            }

            let target = current.other_index();
            let count = self.documents.count(target).await?;
            if !ignore_threshold && count < self.complete_threshold {
                warn!(
                    count = count,
                    threshold = self.complete_threshold,
                    "Refusing to complete rebuild below threshold"
                );
                return Err(LifecycleError::ThresholdNotReached {
                    count,
                    threshold: self.complete_threshold,
                    status: current,
                });
            }

            let next = current.to_build_complete(Utc::now());
            let Some(stored) = self.swap(&current, next).await? else {
                continue;
            };

            if let Err(e) = self.documents.switch_alias(target).await {
                self.revert(&stored, &current).await;
                return Err(e.into());
            }

            info!(index = ?target, count = count, "Rebuild complete, alias switched");
            return Ok(stored);
        }
        Err(LifecycleError::ConcurrentModification(self.max_swap_attempts))
    }

    /// Abandon the rebuild. The partial index stays in place, unaliased.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> Result<IndexStatus, LifecycleError> {
        for _ in 0..self.max_swap_attempts {
            let current = self.status().await?;
            if !current.is_building() {
                return Err(LifecycleError::BuildNotInProgress(current));
            }

            if let Some(stored) = self.swap(&current, current.to_cancelled(Utc::now())).await? {
                info!(index = ?stored.other_index(), "Rebuild cancelled");
                return Ok(stored);
            }
        }
        Err(LifecycleError::ConcurrentModification(self.max_swap_attempts))
    }

    /// Swap current and other without rebuilding.
    ///
    /// Both indices must be complete unless `force` is set. A forced switch
    /// still requires the other physical index to exist and no build to be
    /// running, and marks the promoted index complete.
    #[instrument(skip(self))]
    pub async fn switch_index(&self, force: bool) -> Result<IndexStatus, LifecycleError> {
        for _ in 0..self.max_swap_attempts {
            let current = self.status().await?;
            let target = current.other_index();

            let mut next = current.to_switched();
            if force {
                if current.is_building() {
                    return Err(LifecycleError::BuildAlreadyInProgress(current));
                }
                if !self.documents.index_exists(target).await? {
                    return Err(LifecycleError::BuildIncomplete(current));
                }
                next.current_index_state = IndexState::Completed;
            } else if current.current_index_state != IndexState::Completed
                || current.other_index_state != IndexState::Completed
            {
                return Err(LifecycleError::BuildIncomplete(current));
            }

            let Some(stored) = self.swap(&current, next).await? else {
                continue;
            };

            if let Err(e) = self.documents.switch_alias(target).await {
                self.revert(&stored, &current).await;
                return Err(e.into());
            }

            info!(index = ?target, force = force, "Switched current index");
            return Ok(stored);
        }
        Err(LifecycleError::ConcurrentModification(self.max_swap_attempts))
    }

    /// Replace the record with the bootstrap state. Physical indices are left alone.
    pub async fn reset(&self) -> Result<IndexStatus, LifecycleError> {
        let status = self.statuses.reset().await?;
        warn!("Index status reset");
        Ok(status)
    }

    async fn swap(
        &self,
        current: &IndexStatus,
        next: IndexStatus,
    ) -> Result<Option<IndexStatus>, LifecycleError> {
        let stored = self
            .statuses
            .compare_and_swap(current.version, &next)
            .await?;
        if stored.is_none() {
            warn!(version = current.version, "Index status changed concurrently, retrying");
        }
        Ok(stored)
    }

    /// Put `previous` back after a failed side effect.
    async fn revert(&self, stored: &IndexStatus, previous: &IndexStatus) {
        match self.statuses.compare_and_swap(stored.version, previous).await {
            Ok(Some(_)) => info!("Index status reverted"),
            Ok(None) => error!("Index status changed before it could be reverted"),
            Err(e) => error!(error = %e, "Failed to revert index status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prisoner_indexer_repository::{InMemoryDocumentIndex, InMemoryIndexStatusRepository};
    use prisoner_indexer_shared::PrisonerDocument;

    struct Fixture {
        statuses: Arc<InMemoryIndexStatusRepository>,
        documents: Arc<InMemoryDocumentIndex>,
        manager: IndexLifecycleManager,
    }

    fn fixture(threshold: u64) -> Fixture {
        let statuses = Arc::new(InMemoryIndexStatusRepository::new());
        let documents = Arc::new(InMemoryDocumentIndex::new());
        let manager = IndexLifecycleManager::new(statuses.clone(), documents.clone(), threshold);
        Fixture {
            statuses,
            documents,
            manager,
        }
    }

    async fn put(documents: &InMemoryDocumentIndex, index: SyncIndex, count: usize) {
        for i in 0..count {
            documents
                .put_document(index, &PrisonerDocument::new(format!("A{:04}AA", i)))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_status_is_created_on_first_use() {
        let f = fixture(0);
        let status = f.manager.status().await.unwrap();

        assert_eq!(status.current_index, SyncIndex::None);
        assert_eq!(status.other_index_state, IndexState::Absent);
        assert!(f.manager.active_indices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_creates_other_index() {
        let f = fixture(0);
        let status = f.manager.prepare_for_rebuild().await.unwrap();

        assert_eq!(status.other_index_state, IndexState::Building);
        assert!(status.other_index_start_build_time.is_some());
        assert!(f.documents.index_exists(SyncIndex::A).await.unwrap());
        assert_eq!(f.manager.active_indices().await.unwrap(), vec![SyncIndex::A]);
    }

    #[tokio::test]
    async fn test_prepare_twice_conflicts_without_mutation() {
        let f = fixture(0);
        let first = f.manager.prepare_for_rebuild().await.unwrap();
        put(&f.documents, SyncIndex::A, 3).await;

        let err = f.manager.prepare_for_rebuild().await.unwrap_err();

        assert!(matches!(err, LifecycleError::BuildAlreadyInProgress(_)));
        assert_eq!(err.status(), Some(&first));
        assert_eq!(f.manager.status().await.unwrap(), first);
        assert_eq!(f.documents.count(SyncIndex::A).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_prepare_reverts_when_index_cannot_be_created() {
        let f = fixture(0);
        let before = f.manager.status().await.unwrap();
        f.documents.fail_next(1);

        assert!(f.manager.prepare_for_rebuild().await.is_err());

        let after = f.manager.status().await.unwrap();
        assert_eq!(after.other_index_state, before.other_index_state);
        assert!(f.manager.prepare_for_rebuild().await.is_ok());
    }

    #[tokio::test]
    async fn test_mark_complete_requires_threshold() {
        let f = fixture(5);
        f.manager.prepare_for_rebuild().await.unwrap();
        put(&f.documents, SyncIndex::A, 4).await;

        let err = f.manager.mark_complete(false).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::ThresholdNotReached {
                count: 4,
                threshold: 5,
                ..
            }
        ));
        assert!(f.manager.status().await.unwrap().is_building());

        let status = f.manager.mark_complete(true).await.unwrap();
        assert_eq!(status.current_index, SyncIndex::A);
        assert_eq!(f.documents.alias_target().await.unwrap(), Some(SyncIndex::A));
    }

    #[tokio::test]
    async fn test_mark_complete_switches_alias() {
        let f = fixture(2);
        f.manager.prepare_for_rebuild().await.unwrap();
        put(&f.documents, SyncIndex::A, 2).await;

        let status = f.manager.mark_complete(false).await.unwrap();

        assert_eq!(status.current_index, SyncIndex::A);
        assert_eq!(status.current_index_state, IndexState::Completed);
        assert_eq!(status.other_index_state, IndexState::Absent);
        assert_eq!(f.documents.alias_target().await.unwrap(), Some(SyncIndex::A));
    }

    #[tokio::test]
    async fn test_mark_complete_without_build_conflicts() {
        let f = fixture(0);
        assert!(matches!(
            f.manager.mark_complete(true).await,
            Err(LifecycleError::BuildNotInProgress(_))
        ));
        assert!(matches!(
            f.manager.cancel().await,
            Err(LifecycleError::BuildNotInProgress(_))
        ));
    }

    #[tokio::test]
    async fn test_alias_failure_reverts_completion() {
        let f = fixture(0);
        f.manager.prepare_for_rebuild().await.unwrap();
        f.documents.fail_alias_switches(1);

        assert!(f.manager.mark_complete(true).await.is_err());

        let status = f.manager.status().await.unwrap();
        assert!(status.is_building());
        assert_eq!(status.current_index, SyncIndex::None);
    }

    #[tokio::test]
    async fn test_cancel_leaves_index_unaliased() {
        let f = fixture(0);
        f.manager.prepare_for_rebuild().await.unwrap();
        f.manager.mark_complete(true).await.unwrap();
        f.manager.prepare_for_rebuild().await.unwrap();
        put(&f.documents, SyncIndex::B, 1).await;

        let status = f.manager.cancel().await.unwrap();

        assert_eq!(status.other_index_state, IndexState::Cancelled);
        assert!(status.other_index_end_build_time.is_some());
        assert_eq!(f.documents.alias_target().await.unwrap(), Some(SyncIndex::A));
        assert_eq!(f.documents.count(SyncIndex::B).await.unwrap(), 1);
        assert!(matches!(
            f.manager.mark_complete(true).await,
            Err(LifecycleError::BuildNotInProgress(_))
        ));
    }

    #[tokio::test]
    async fn test_switch_requires_both_complete_unless_forced() {
        let f = fixture(0);
        f.manager.prepare_for_rebuild().await.unwrap();
        f.manager.mark_complete(true).await.unwrap();
        f.manager.prepare_for_rebuild().await.unwrap();
        f.manager.mark_complete(true).await.unwrap();
        // B is current, A was demoted
        assert!(matches!(
            f.manager.switch_index(false).await,
            Err(LifecycleError::BuildIncomplete(_))
        ));

        let rolled_back = f.manager.switch_index(true).await.unwrap();
        assert_eq!(rolled_back.current_index, SyncIndex::A);
        assert_eq!(rolled_back.current_index_state, IndexState::Completed);
        assert_eq!(f.documents.alias_target().await.unwrap(), Some(SyncIndex::A));

        // both complete now, so an unforced switch is allowed
        let switched = f.manager.switch_index(false).await.unwrap();
        assert_eq!(switched.current_index, SyncIndex::B);
        assert_eq!(f.documents.alias_target().await.unwrap(), Some(SyncIndex::B));
    }

    #[tokio::test]
    async fn test_forced_switch_needs_existing_index() {
        let f = fixture(0);
        f.manager.prepare_for_rebuild().await.unwrap();
        f.manager.mark_complete(true).await.unwrap();

        assert!(matches!(
            f.manager.switch_index(true).await,
            Err(LifecycleError::BuildIncomplete(_))
        ));
    }

    #[tokio::test]
    async fn test_lost_swaps_are_retried() {
        let f = fixture(0);
        f.manager.status().await.unwrap();
        f.statuses.force_conflicts(2);

        let status = f.manager.prepare_for_rebuild().await.unwrap();
        assert!(status.is_building());
    }

    #[tokio::test]
    async fn test_persistent_conflicts_give_up() {
        let f = fixture(0);
        let manager = IndexLifecycleManager::new(f.statuses.clone(), f.documents.clone(), 0)
            .with_max_swap_attempts(2);
        manager.status().await.unwrap();
        f.statuses.force_conflicts(10);

        assert!(matches!(
            manager.prepare_for_rebuild().await,
            Err(LifecycleError::ConcurrentModification(2))
        ));
    }
}
