//! Document index provider trait definition.
//!
//! This module defines the abstract interface for the document store: document
//! CRUD against one of the two physical indices, plus the administrative
//! operations (create/delete/count/alias) the blue/green lifecycle relies on.

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::BatchOperationSummary;
use prisoner_indexer_shared::{PrisonerDocument, SyncIndex};

/// Abstracts the underlying document store (OpenSearch, Elasticsearch, in-memory).
///
/// Physical indices are addressed by [`SyncIndex`]; the implementation owns the
/// mapping to concrete index names and the single public alias. Passing
/// `SyncIndex::None` to a document or index operation is a validation error.
///
/// All methods return `Result<T, SearchIndexError>` for consistent error handling
/// across backends.
#[async_trait]
pub trait DocumentIndexProvider: Send + Sync {
    /// Create a physical index with the prisoner mapping.
    async fn create_index(&self, index: SyncIndex) -> Result<(), SearchIndexError>;

    /// Delete a physical index. Deleting a missing index succeeds.
    async fn delete_index(&self, index: SyncIndex) -> Result<(), SearchIndexError>;

    /// Check whether a physical index exists.
    async fn index_exists(&self, index: SyncIndex) -> Result<bool, SearchIndexError>;

    /// Count the documents in a physical index.
    async fn count(&self, index: SyncIndex) -> Result<u64, SearchIndexError>;

    /// Fetch a document by prisoner number.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(doc))` - If the document exists
    /// * `Ok(None)` - If the document (or the index) does not exist
    async fn get_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<Option<PrisonerDocument>, SearchIndexError>;

    /// Write a full document, replacing any existing one with the same id.
    async fn put_document(
        &self,
        index: SyncIndex,
        document: &PrisonerDocument,
    ) -> Result<(), SearchIndexError>;

    /// Write many documents and report per-document outcomes.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Aggregate statistics and individual results
    /// * `Err(SearchIndexError)` - If the bulk operation fails entirely
    async fn bulk_put_documents(
        &self,
        index: SyncIndex,
        documents: &[PrisonerDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<(), SearchIndexError>;

    /// The physical index the public alias currently resolves to, if any.
    async fn alias_target(&self) -> Result<Option<SyncIndex>, SearchIndexError>;

    /// Atomically repoint the public alias to `index`, removing it from any other
    /// physical index in the same request.
    async fn switch_alias(&self, index: SyncIndex) -> Result<(), SearchIndexError>;
}
