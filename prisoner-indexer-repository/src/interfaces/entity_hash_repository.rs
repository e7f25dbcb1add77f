//! Dedup hash repository trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::RepositoryError;
use crate::types::HashStream;

/// Records the hash of the last-published representation per prisoner.
///
/// This trait provides the dedup gate: an event is published only when
/// [`upsert_if_changed`](EntityHashRepository::upsert_if_changed) reports a change.
#[async_trait]
pub trait EntityHashRepository: Send + Sync {
    /// Insert the hash, or update it only if it differs from the stored one.
    ///
    /// The check and the write are a single atomic statement, so two concurrent
    /// publishers with the same hash cannot both observe a change.
    ///
    /// # Returns
    ///
    /// The number of rows affected: `1` when new or changed, `0` when unchanged.
    async fn upsert_if_changed(
        &self,
        stream: HashStream,
        prisoner_number: &str,
        hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    /// Read the stored hash for a prisoner.
    async fn get_hash(
        &self,
        stream: HashStream,
        prisoner_number: &str,
    ) -> Result<Option<String>, RepositoryError>;

    /// Remove the stored hash for a prisoner (used when a prisoner is deleted).
    async fn delete(&self, stream: HashStream, prisoner_number: &str)
        -> Result<u64, RepositoryError>;

    /// Bulk-delete rows last updated before `cutoff`, returning the number deleted.
    async fn delete_older_than(
        &self,
        stream: HashStream,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}
