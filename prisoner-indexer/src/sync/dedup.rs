//! Dedup gate in front of the outbound notifier.
//!
//! A hash of what is about to be published is upserted into the hash store;
//! only a reported change lets the events through. A [`Claim`] remembers the
//! hash it replaced so an update that fails after claiming can hand it back.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use prisoner_indexer_repository::{EntityHashRepository, HashStream, RepositoryError};
use prisoner_indexer_shared::{PrisonerDocument, PrisonerEvent};

use crate::retry::RetryPolicy;

/// A hash recorded for one stream, with the value it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub stream: HashStream,
    pub previous: Option<String>,
}

/// Hashes outbound content and claims it in the hash store.
#[derive(Clone)]
pub struct DedupGate {
    hashes: Arc<dyn EntityHashRepository>,
    retry: RetryPolicy,
}

impl DedupGate {
    pub fn new(hashes: Arc<dyn EntityHashRepository>, retry: RetryPolicy) -> Self {
        Self { hashes, retry }
    }

    /// Hash of the document's prisoner data, ignoring indexing metadata.
    pub fn document_hash(document: &PrisonerDocument) -> String {
        let bytes = serde_json::to_vec(&document.without_metadata()).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Hash of a batch of transition events, bound to the document they came from.
    pub fn events_hash(document_hash: &str, events: &[PrisonerEvent]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(document_hash.as_bytes());
        hasher.update(serde_json::to_vec(events).unwrap_or_default());
        hex::encode(hasher.finalize())
    }

    /// Record `hash` for the prisoner, returning whether it differs from the
    /// last recorded one.
    pub async fn try_claim(
        &self,
        stream: HashStream,
        prisoner_number: &str,
        hash: &str,
    ) -> Result<bool, RepositoryError> {
        let affected = self
            .retry
            .run("upsert_hash", || {
                self.hashes
                    .upsert_if_changed(stream, prisoner_number, hash, Utc::now())
            })
            .await?;

        debug!(
            prisoner_number = prisoner_number,
            stream = stream.table(),
            changed = affected > 0,
            "Dedup gate checked"
        );
        Ok(affected > 0)
    }

    /// Like [`try_claim`](Self::try_claim), but returns the replaced hash so
    /// the claim can be released. `None` when the hash is unchanged.
    pub async fn claim(
        &self,
        stream: HashStream,
        prisoner_number: &str,
        hash: &str,
    ) -> Result<Option<Claim>, RepositoryError> {
        let previous = self.current(stream, prisoner_number).await?;
        if !self.try_claim(stream, prisoner_number, hash).await? {
            return Ok(None);
        }
        Ok(Some(Claim { stream, previous }))
    }

    /// Put back the hash a claim replaced.
    pub async fn release(&self, prisoner_number: &str, claim: &Claim) -> Result<(), RepositoryError> {
        let stream = claim.stream;
        match claim.previous.as_deref() {
            Some(previous) => {
                self.retry
                    .run("restore_hash", || {
                        self.hashes
                            .upsert_if_changed(stream, prisoner_number, previous, Utc::now())
                    })
                    .await?;
            }
            None => {
                self.retry
                    .run("delete_hash", || self.hashes.delete(stream, prisoner_number))
                    .await?;
            }
        }
        debug!(
            prisoner_number = prisoner_number,
            stream = stream.table(),
            "Dedup claim released"
        );
        Ok(())
    }

    /// Forget both hashes for a removed prisoner, returning what was dropped.
    pub async fn forget(&self, prisoner_number: &str) -> Result<Vec<Claim>, RepositoryError> {
        let mut forgotten = Vec::with_capacity(2);
        for stream in [HashStream::Document, HashStream::Event] {
            let previous = self.current(stream, prisoner_number).await?;
            self.retry
                .run("delete_hash", || self.hashes.delete(stream, prisoner_number))
                .await?;
            forgotten.push(Claim { stream, previous });
        }
        Ok(forgotten)
    }

    async fn current(
        &self,
        stream: HashStream,
        prisoner_number: &str,
    ) -> Result<Option<String>, RepositoryError> {
        self.retry
            .run("get_hash", || self.hashes.get_hash(stream, prisoner_number))
            .await
    }
}
