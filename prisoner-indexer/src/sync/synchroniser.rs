//! The consistency engine.
//!
//! [`PrisonerSynchroniser::synchronise`] brings one prisoner's indexed document
//! in line with the system of record and publishes the events the change
//! implies. Work for one prisoner is serialised through [`EntityLocks`].
//!
//! The order of an update is fixed: read, build, diff and decide without side
//! effects; then claim the decided events in the dedup store; then write the
//! document to every active index; then publish what was claimed. A failure
//! before the claim leaves nothing applied. A failure after it puts back the
//! documents and hashes that were replaced, so a redelivered notification
//! decides and publishes the same events again.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use prisoner_indexer_repository::{DocumentIndexProvider, HashStream};
use prisoner_indexer_shared::{PrisonerDocument, PrisonerEvent, SyncIndex};

use super::decisions::decide;
use super::dedup::{Claim, DedupGate};
use super::difference::get_differences;
use super::locks::EntityLocks;
use super::movement::Classification;
use crate::errors::SyncError;
use crate::ingest::DocumentBuilder;
use crate::lifecycle::IndexLifecycleManager;
use crate::notifier::EventPublisher;
use crate::retry::RetryPolicy;

/// What a synchronisation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOutcome {
    /// The document was written; `published` events went out.
    Updated { published: usize },
    /// Upstream matches the indexed document.
    NoChange,
    /// The prisoner does not exist upstream; nothing was written.
    NotFound,
    /// No index is receiving writes yet.
    NoActiveIndices,
    /// The prisoner was removed from every active index.
    Removed { published: bool },
}

pub struct PrisonerSynchroniser {
    builder: DocumentBuilder,
    documents: Arc<dyn DocumentIndexProvider>,
    lifecycle: Arc<IndexLifecycleManager>,
    dedup: DedupGate,
    publisher: Arc<dyn EventPublisher>,
    locks: EntityLocks,
    retry: RetryPolicy,
}

impl PrisonerSynchroniser {
    pub fn new(
        builder: DocumentBuilder,
        documents: Arc<dyn DocumentIndexProvider>,
        lifecycle: Arc<IndexLifecycleManager>,
        dedup: DedupGate,
        publisher: Arc<dyn EventPublisher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            builder,
            documents,
            lifecycle,
            dedup,
            publisher,
            locks: EntityLocks::new(),
            retry,
        }
    }

    pub(super) fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    /// Per-prisoner locks shared with anything else that writes documents.
    pub fn locks(&self) -> &EntityLocks {
        &self.locks
    }

    /// Synchronise one prisoner with the system of record.
    #[instrument(skip(self))]
    pub async fn synchronise(&self, prisoner_number: &str) -> Result<SyncOutcome, SyncError> {
        self.locks
            .run(prisoner_number, self.synchronise_locked(prisoner_number))
            .await
    }

    /// Remove a prisoner deleted upstream from every active index.
    ///
    /// A removed event is published only if a document existed.
    #[instrument(skip(self))]
    pub async fn delete(&self, prisoner_number: &str) -> Result<SyncOutcome, SyncError> {
        self.locks
            .run(prisoner_number, self.delete_locked(prisoner_number))
            .await
    }

    async fn synchronise_locked(&self, prisoner_number: &str) -> Result<SyncOutcome, SyncError> {
        let indices = self.lifecycle.active_indices().await?;
        let Some(&primary) = indices.first() else {
            info!(
                prisoner_number = prisoner_number,
                event = "prisoner_skipped_no_index",
                "No active index, skipping update"
            );
            return Ok(SyncOutcome::NoActiveIndices);
        };

        let existing = self.get_document(primary, prisoner_number).await?;
        let Some(mut document) = self
            .builder
            .fetch_and_build(prisoner_number, existing.as_ref())
            .await?
        else {
            info!(
                prisoner_number = prisoner_number,
                event = "prisoner_not_found",
                "Prisoner not found upstream, skipping update"
            );
            return Ok(SyncOutcome::NotFound);
        };

        let differences = get_differences(existing.as_ref(), &document);
        if existing.is_some() && differences.is_empty() {
            debug!(
                prisoner_number = prisoner_number,
                event = "prisoner_no_change",
                "No change to prisoner"
            );
            return Ok(SyncOutcome::NoChange);
        }

        let decisions = decide(
            existing.as_ref(),
            &document,
            &differences,
            Utc::now().naive_utc(),
        );
        if decisions.movement == Classification::Unknown {
            warn!(
                prisoner_number = prisoner_number,
                before_status = existing.as_ref().and_then(|d| d.status.as_deref()),
                after_status = document.status.as_deref(),
                movement_type = document.last_movement_type_code.as_deref(),
                movement_reason = document.last_movement_reason_code.as_deref(),
                event = "unknown_movement",
                "In/out status changed without a matching movement"
            );
        }

        let previous = self
            .previous_documents(&indices, primary, existing, prisoner_number)
            .await?;
        let (to_publish, claims) = self
            .claim(
                prisoner_number,
                &document,
                decisions.document_event,
                decisions.transition_events,
            )
            .await?;

        document.indexed_at = Some(Utc::now());
        if let Err(e) = self.apply(&indices, &document, &to_publish).await {
            self.roll_back(prisoner_number, &previous, &claims).await;
            return Err(e);
        }

        info!(
            prisoner_number = prisoner_number,
            categories = differences.len(),
            published = to_publish.len(),
            "Prisoner synchronised"
        );
        Ok(SyncOutcome::Updated {
            published: to_publish.len(),
        })
    }

    /// Write the document to every index, then publish.
    async fn apply(
        &self,
        indices: &[SyncIndex],
        document: &PrisonerDocument,
        to_publish: &[PrisonerEvent],
    ) -> Result<(), SyncError> {
        for index in indices {
            self.retry
                .run("put_document", || self.documents.put_document(*index, document))
                .await?;
        }
        for event in to_publish {
            self.publisher.publish(event).await?;
        }
        Ok(())
    }

    /// The document each index held before this update.
    async fn previous_documents(
        &self,
        indices: &[SyncIndex],
        primary: SyncIndex,
        existing: Option<PrisonerDocument>,
        prisoner_number: &str,
    ) -> Result<Vec<(SyncIndex, Option<PrisonerDocument>)>, SyncError> {
        let mut previous = Vec::with_capacity(indices.len());
        previous.push((primary, existing));
        for index in indices.iter().filter(|index| **index != primary) {
            previous.push((*index, self.get_document(*index, prisoner_number).await?));
        }
        Ok(previous)
    }

    /// Undo a failed update: restore each index's previous document and
    /// release the dedup claims. Failures here are logged; the caller already
    /// reports the original error.
    async fn roll_back(
        &self,
        prisoner_number: &str,
        previous: &[(SyncIndex, Option<PrisonerDocument>)],
        claims: &[Claim],
    ) {
        for (index, document) in previous {
            let restored = match document {
                Some(document) => {
                    self.retry
                        .run("put_document", || self.documents.put_document(*index, document))
                        .await
                }
                None => {
                    self.retry
                        .run("delete_document", || {
                            self.documents.delete_document(*index, prisoner_number)
                        })
                        .await
                }
            };
            if let Err(e) = restored {
                error!(
                    prisoner_number = prisoner_number,
                    index = ?index,
                    error = %e,
                    "Failed to restore indexed document"
                );
            }
        }

        self.release_all(prisoner_number, claims).await;

        warn!(
            prisoner_number = prisoner_number,
            event = "update_rolled_back",
            "Update failed after claiming, rolled back"
        );
    }

    /// Pass decided events through the dedup gate, returning those to publish
    /// and the claims that let them through.
    async fn claim(
        &self,
        prisoner_number: &str,
        document: &PrisonerDocument,
        document_event: Option<PrisonerEvent>,
        transition_events: Vec<PrisonerEvent>,
    ) -> Result<(Vec<PrisonerEvent>, Vec<Claim>), SyncError> {
        let document_hash = DedupGate::document_hash(document);
        let mut to_publish = Vec::new();
        let mut claims = Vec::new();

        if let Some(event) = document_event {
            match self
                .dedup
                .claim(HashStream::Document, prisoner_number, &document_hash)
                .await
            {
                Ok(Some(claim)) => {
                    claims.push(claim);
                    to_publish.push(event);
                }
                Ok(None) => info!(
                    prisoner_number = prisoner_number,
                    event_type = event.event_type(),
                    event = "duplicate_suppressed",
                    "Document event already published"
                ),
                Err(e) => return Err(e.into()),
            }
        }

        if !transition_events.is_empty() {
            let events_hash = DedupGate::events_hash(&document_hash, &transition_events);
            match self
                .dedup
                .claim(HashStream::Event, prisoner_number, &events_hash)
                .await
            {
                Ok(Some(claim)) => {
                    claims.push(claim);
                    to_publish.extend(transition_events);
                }
                Ok(None) => info!(
                    prisoner_number = prisoner_number,
                    count = transition_events.len(),
                    event = "duplicate_suppressed",
                    "Transition events already published"
                ),
                Err(e) => {
                    self.release_all(prisoner_number, &claims).await;
                    return Err(e.into());
                }
            }
        }

        Ok((to_publish, claims))
    }

    async fn release_all(&self, prisoner_number: &str, claims: &[Claim]) {
        for claim in claims {
            if let Err(e) = self.dedup.release(prisoner_number, claim).await {
                error!(
                    prisoner_number = prisoner_number,
                    stream = claim.stream.table(),
                    error = %e,
                    "Failed to release dedup claim"
                );
            }
        }
    }

    async fn delete_locked(&self, prisoner_number: &str) -> Result<SyncOutcome, SyncError> {
        let indices = self.lifecycle.active_indices().await?;

        let mut previous = Vec::with_capacity(indices.len());
        for index in &indices {
            previous.push((*index, self.get_document(*index, prisoner_number).await?));
        }
        let existed = previous.iter().any(|(_, document)| document.is_some());

        let mut forgotten = Vec::new();
        let removed = async {
            for index in &indices {
                self.retry
                    .run("delete_document", || {
                        self.documents.delete_document(*index, prisoner_number)
                    })
                    .await?;
            }
            forgotten = self.dedup.forget(prisoner_number).await?;

            if existed {
                self.publisher
                    .publish(&PrisonerEvent::Removed {
                        prisoner_number: prisoner_number.to_string(),
                    })
                    .await?;
            }
            Ok::<(), SyncError>(())
        }
        .await;
        if let Err(e) = removed {
            self.roll_back(prisoner_number, &previous, &forgotten).await;
            return Err(e);
        }

        info!(
            prisoner_number = prisoner_number,
            existed = existed,
            "Prisoner removed"
        );
        Ok(SyncOutcome::Removed { published: existed })
    }

    async fn get_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<Option<PrisonerDocument>, SyncError> {
        Ok(self
            .retry
            .run("get_document", || {
                self.documents.get_document(index, prisoner_number)
            })
            .await?)
    }
}
