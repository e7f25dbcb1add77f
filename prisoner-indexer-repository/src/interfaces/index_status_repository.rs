//! Index status repository trait definition.

use async_trait::async_trait;

use crate::errors::RepositoryError;
use prisoner_indexer_shared::IndexStatus;

/// Persists the singleton [`IndexStatus`] record.
///
/// Writes go through [`compare_and_swap`](IndexStatusRepository::compare_and_swap):
/// the new record is stored only if the stored version still equals the version
/// the caller read. A losing writer must re-read and re-check its guard.
#[async_trait]
pub trait IndexStatusRepository: Send + Sync {
    /// Read the status record, if it has been created.
    async fn get(&self) -> Result<Option<IndexStatus>, RepositoryError>;

    /// Create the bootstrap record unless one exists, returning the stored record.
    async fn get_or_create(&self) -> Result<IndexStatus, RepositoryError>;

    /// Store `next` if the stored version equals `expected_version`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(status))` - The stored record, with its version bumped
    /// * `Ok(None)` - Another writer changed the record first
    async fn compare_and_swap(
        &self,
        expected_version: i64,
        next: &IndexStatus,
    ) -> Result<Option<IndexStatus>, RepositoryError>;

    /// Replace the record with the bootstrap state (tests and recovery only).
    async fn reset(&self) -> Result<IndexStatus, RepositoryError>;
}
