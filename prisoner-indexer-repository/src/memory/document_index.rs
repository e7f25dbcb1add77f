use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::SearchIndexError;
use crate::interfaces::DocumentIndexProvider;
use crate::types::{BatchOperationResult, BatchOperationSummary};
use prisoner_indexer_shared::{PrisonerDocument, SyncIndex};

/// In-memory document store with two physical indices and one alias.
///
/// Writing to an index that does not exist creates it, as OpenSearch does
/// with automatic index creation.
#[derive(Default)]
pub struct InMemoryDocumentIndex {
    indices: RwLock<HashMap<SyncIndex, HashMap<String, PrisonerDocument>>>,
    alias: RwLock<Option<SyncIndex>>,
    transient_failures: AtomicUsize,
    rejected: RwLock<HashSet<String>>,
    alias_failures: AtomicUsize,
}

impl InMemoryDocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls with a transient `Unavailable` error.
    pub fn fail_next(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` alias switches with a permanent error.
    pub fn fail_alias_switches(&self, count: usize) {
        self.alias_failures.store(count, Ordering::SeqCst);
    }

    /// Reject every write of the given prisoner's document.
    pub async fn reject_document(&self, prisoner_number: &str) {
        self.rejected
            .write()
            .await
            .insert(prisoner_number.to_string());
    }

    /// Snapshot of the documents held in `index`.
    pub async fn documents(&self, index: SyncIndex) -> Vec<PrisonerDocument> {
        let indices = self.indices.read().await;
        let mut documents: Vec<PrisonerDocument> = indices
            .get(&index)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        documents.sort_by(|a, b| a.prisoner_number.cmp(&b.prisoner_number));
        documents
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_available(&self) -> Result<(), SearchIndexError> {
        if Self::take_failure(&self.transient_failures) {
            return Err(SearchIndexError::unavailable("injected transient failure"));
        }
        Ok(())
    }

    fn require_physical(index: SyncIndex) -> Result<(), SearchIndexError> {
        if index == SyncIndex::None {
            return Err(SearchIndexError::validation(
                "No physical index exists for SyncIndex::None",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentIndexProvider for InMemoryDocumentIndex {
    async fn create_index(&self, index: SyncIndex) -> Result<(), SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        let mut indices = self.indices.write().await;
        if indices.contains_key(&index) {
            return Err(SearchIndexError::index_admin(format!(
                "index {:?} already exists",
                index
            )));
        }
        indices.insert(index, HashMap::new());
        Ok(())
    }

    async fn delete_index(&self, index: SyncIndex) -> Result<(), SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        self.indices.write().await.remove(&index);
        let mut alias = self.alias.write().await;
        if *alias == Some(index) {
            *alias = None;
        }
        Ok(())
    }

    async fn index_exists(&self, index: SyncIndex) -> Result<bool, SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        Ok(self.indices.read().await.contains_key(&index))
    }

    async fn count(&self, index: SyncIndex) -> Result<u64, SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        Ok(self
            .indices
            .read()
            .await
            .get(&index)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn get_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<Option<PrisonerDocument>, SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        Ok(self
            .indices
            .read()
            .await
            .get(&index)
            .and_then(|docs| docs.get(prisoner_number))
            .cloned())
    }

    async fn put_document(
        &self,
        index: SyncIndex,
        document: &PrisonerDocument,
    ) -> Result<(), SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        if self.rejected.read().await.contains(&document.prisoner_number) {
            return Err(SearchIndexError::index(format!(
                "document {} rejected",
                document.prisoner_number
            )));
        }
        self.indices
            .write()
            .await
            .entry(index)
            .or_default()
            .insert(document.prisoner_number.clone(), document.clone());
        Ok(())
    }

    async fn bulk_put_documents(
        &self,
        index: SyncIndex,
        documents: &[PrisonerDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        let rejected = self.rejected.read().await;
        let mut indices = self.indices.write().await;
        let docs = indices.entry(index).or_default();

        let results = documents
            .iter()
            .map(|document| {
                let refused = rejected.contains(&document.prisoner_number);
                if !refused {
                    docs.insert(document.prisoner_number.clone(), document.clone());
                }
                BatchOperationResult {
                    prisoner_number: document.prisoner_number.clone(),
                    success: !refused,
                    error: refused.then(|| SearchIndexError::index("document rejected")),
                }
            })
            .collect();

        Ok(BatchOperationSummary::from_results(results))
    }

    async fn delete_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<(), SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        if let Some(docs) = self.indices.write().await.get_mut(&index) {
            docs.remove(prisoner_number);
        }
        Ok(())
    }

    async fn alias_target(&self) -> Result<Option<SyncIndex>, SearchIndexError> {
        self.check_available()?;
        Ok(*self.alias.read().await)
    }

    async fn switch_alias(&self, index: SyncIndex) -> Result<(), SearchIndexError> {
        Self::require_physical(index)?;
        self.check_available()?;
        if Self::take_failure(&self.alias_failures) {
            return Err(SearchIndexError::alias("injected alias failure"));
        }
        if !self.indices.read().await.contains_key(&index) {
            return Err(SearchIndexError::alias(format!(
                "cannot alias missing index {:?}",
                index
            )));
        }
        *self.alias.write().await = Some(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_alias_follows_switch() {
        let store = InMemoryDocumentIndex::new();
        store.create_index(SyncIndex::A).await.unwrap();
        store.create_index(SyncIndex::B).await.unwrap();

        assert_eq!(store.alias_target().await.unwrap(), None);
        store.switch_alias(SyncIndex::A).await.unwrap();
        assert_eq!(store.alias_target().await.unwrap(), Some(SyncIndex::A));
        store.switch_alias(SyncIndex::B).await.unwrap();
        assert_eq!(store.alias_target().await.unwrap(), Some(SyncIndex::B));
    }

    #[tokio::test]
    async fn test_switch_to_missing_index_fails() {
        let store = InMemoryDocumentIndex::new();
        assert!(store.switch_alias(SyncIndex::A).await.is_err());
    }

    #[tokio::test]
    async fn test_none_index_is_rejected() {
        let store = InMemoryDocumentIndex::new();
        let err = store.count(SyncIndex::None).await.unwrap_err();
        assert!(matches!(err, SearchIndexError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient_and_consumed() {
        let store = InMemoryDocumentIndex::new();
        store.fail_next(2);

        assert!(store.count(SyncIndex::A).await.unwrap_err().is_transient());
        assert!(store.count(SyncIndex::A).await.unwrap_err().is_transient());
        assert_eq!(store.count(SyncIndex::A).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bulk_put_reports_rejected_documents() {
        let store = InMemoryDocumentIndex::new();
        store.reject_document("A2222AA").await;

        let summary = store
            .bulk_put_documents(
                SyncIndex::A,
                &[
                    PrisonerDocument::new("A1111AA"),
                    PrisonerDocument::new("A2222AA"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.count(SyncIndex::A).await.unwrap(), 1);
    }
}
