//! Ingestion pipeline.
//!
//! Full population fans out one [`IndexJob::PopulatePage`] per page of the
//! upstream population; each page is fetched, built and bulk-written into the
//! index being rebuilt. Page and single-prisoner writes hold the consistency
//! engine's per-prisoner locks, so a page never writes a copy built before a
//! concurrent update over that update. Refresh fans out [`IndexJob::RefreshPage`] jobs that run
//! every prisoner through the consistency engine, so missed notifications are
//! both corrected in the index and published.

mod builder;
mod queue;

pub use builder::DocumentBuilder;
pub use queue::{spawn_workers, IndexJob, JobHandler, JobQueue, JobReceiver, QueuedJob};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::errors::{LifecycleError, SyncError};
use crate::lifecycle::IndexLifecycleManager;
use crate::sync::{PrisonerSynchroniser, SyncOutcome};
use prisoner_indexer_repository::{DocumentIndexProvider, SearchIndexError};
use prisoner_indexer_shared::{IndexState, IndexStatus, PrisonerDocument, SyncIndex};

/// Counts from one processed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub page: u64,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct IngestionPipeline {
    builder: DocumentBuilder,
    documents: Arc<dyn DocumentIndexProvider>,
    lifecycle: Arc<IndexLifecycleManager>,
    synchroniser: Arc<PrisonerSynchroniser>,
    queue: JobQueue,
    page_size: u64,
}

impl IngestionPipeline {
    pub fn new(
        builder: DocumentBuilder,
        documents: Arc<dyn DocumentIndexProvider>,
        lifecycle: Arc<IndexLifecycleManager>,
        synchroniser: Arc<PrisonerSynchroniser>,
        queue: JobQueue,
        page_size: u64,
    ) -> Self {
        Self {
            builder,
            documents,
            lifecycle,
            synchroniser,
            queue,
            page_size: page_size.max(1),
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Start a rebuild of the other index and enqueue its population.
    ///
    /// If population cannot be enqueued the build is cancelled, so the same
    /// request can simply be retried.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<(IndexStatus, u64), SyncError> {
        let status = self.lifecycle.prepare_for_rebuild().await?;
        match self.populate_full().await {
            Ok(pages) => Ok((status, pages)),
            Err(e) => {
                warn!(
                    error = %e,
                    event = "rebuild_abandoned",
                    "Failed to enqueue population, cancelling the build"
                );
                if let Err(cancel_error) = self.lifecycle.cancel().await {
                    error!(error = %cancel_error, "Failed to cancel the build");
                }
                Err(e)
            }
        }
    }

    /// Enqueue a page job for every page of the population, targeting the
    /// index being rebuilt. Returns the number of pages enqueued.
    #[instrument(skip(self))]
    pub async fn populate_full(&self) -> Result<u64, SyncError> {
        let status = self.lifecycle.status().await?;
        if !status.is_building() {
            return Err(LifecycleError::BuildNotInProgress(status).into());
        }
        let target = status.other_index();

        let pages = self.page_count().await?;
        for page in 0..pages {
            self.queue
                .enqueue(IndexJob::PopulatePage { page, target })
                .await?;
        }

        info!(pages = pages, index = ?target, "Population enqueued");
        Ok(pages)
    }

    /// Build one page of prisoners and write them to `target` only.
    ///
    /// Prisoners that disappeared upstream since listing are skipped. If any
    /// document on the page fails to write the page fails, so the job is
    /// retried; rewriting the page is idempotent.
    #[instrument(skip(self))]
    pub async fn populate_page(&self, page: u64, target: SyncIndex) -> Result<PageSummary, SyncError> {
        let numbers = self.page_numbers(page).await?;
        let summary = self
            .synchroniser
            .locks()
            .run_all(&numbers, self.populate_page_locked(page, target, &numbers))
            .await?;

        info!(
            page = page,
            index = ?target,
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            "Page populated"
        );
        if summary.failed > 0 {
            return Err(SearchIndexError::bulk_index(format!(
                "{} of {} documents on page {} failed to index",
                summary.failed,
                summary.written + summary.failed,
                page
            ))
            .into());
        }
        Ok(summary)
    }

    async fn populate_page_locked(
        &self,
        page: u64,
        target: SyncIndex,
        numbers: &[String],
    ) -> Result<PageSummary, SyncError> {
        let fallback = Self::fallback_index(&self.lifecycle.status().await?, target);

        let mut summary = PageSummary {
            page,
            ..Default::default()
        };
        let mut documents = Vec::with_capacity(numbers.len());
        for prisoner_number in numbers {
            let existing = match fallback {
                Some(index) => self.get_document(index, prisoner_number).await?,
                None => None,
            };
            match self
                .builder
                .fetch_and_build(prisoner_number, existing.as_ref())
                .await?
            {
                Some(mut document) => {
                    document.indexed_at = Some(Utc::now());
                    documents.push(document);
                }
                None => {
                    info!(
                        prisoner_number = %prisoner_number,
                        page = page,
                        event = "prisoner_skipped",
                        "Prisoner not found upstream, skipping"
                    );
                    summary.skipped += 1;
                }
            }
        }

        if !documents.is_empty() {
            let result = self
                .builder
                .retry()
                .run("bulk_put_documents", || {
                    self.documents.bulk_put_documents(target, &documents)
                })
                .await?;
            for failure in result.results.iter().filter(|r| !r.success) {
                error!(
                    prisoner_number = %failure.prisoner_number,
                    error = ?failure.error,
                    "Failed to index prisoner"
                );
            }
            summary.written = result.succeeded;
            summary.failed = result.failed;
        }
        Ok(summary)
    }

    /// Build one prisoner and write it to every active index, without events.
    #[instrument(skip(self))]
    pub async fn populate_one(&self, prisoner_number: &str) -> Result<PrisonerDocument, SyncError> {
        self.synchroniser
            .locks()
            .run(prisoner_number, self.populate_one_locked(prisoner_number))
            .await
    }

    async fn populate_one_locked(&self, prisoner_number: &str) -> Result<PrisonerDocument, SyncError> {
        let status = self.lifecycle.status().await?;
        let indices = status.active_indices();
        let Some(&primary) = indices.first() else {
            return Err(LifecycleError::NoActiveIndices(status).into());
        };

        let existing = self.get_document(primary, prisoner_number).await?;
        let mut document = self
            .builder
            .fetch_and_build(prisoner_number, existing.as_ref())
            .await?
            .ok_or_else(|| SyncError::NotFound(prisoner_number.to_string()))?;

        document.indexed_at = Some(Utc::now());
        for index in &indices {
            self.builder
                .retry()
                .run("put_document", || self.documents.put_document(*index, &document))
                .await?;
        }

        info!(prisoner_number = prisoner_number, indices = ?indices, "Prisoner indexed");
        Ok(document)
    }

    /// Enqueue a refresh job for every page of the population.
    ///
    /// Requires a completed current index.
    #[instrument(skip(self))]
    pub async fn refresh_full(&self) -> Result<u64, SyncError> {
        let status = self.lifecycle.status().await?;
        if status.current_index == SyncIndex::None
            || status.current_index_state != IndexState::Completed
        {
            return Err(LifecycleError::NoActiveIndices(status).into());
        }

        let pages = self.page_count().await?;
        for page in 0..pages {
            self.queue.enqueue(IndexJob::RefreshPage { page }).await?;
        }

        info!(pages = pages, "Refresh enqueued");
        Ok(pages)
    }

    /// Run every prisoner on a page through the consistency engine.
    ///
    /// Every prisoner is attempted; if any failed the first error is returned
    /// so the page is retried.
    #[instrument(skip(self))]
    pub async fn refresh_page(&self, page: u64) -> Result<PageSummary, SyncError> {
        let numbers = self.page_numbers(page).await?;

        let mut summary = PageSummary {
            page,
            ..Default::default()
        };
        let mut first_error = None;
        for prisoner_number in &numbers {
            match self.synchroniser.synchronise(prisoner_number).await {
                Ok(SyncOutcome::Updated { .. }) => summary.written += 1,
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    error!(prisoner_number = %prisoner_number, error = %e, "Failed to refresh prisoner");
                    summary.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(
            page = page,
            updated = summary.written,
            unchanged = summary.skipped,
            failed = summary.failed,
            "Page refreshed"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Refresh a single prisoner.
    pub async fn refresh_one(&self, prisoner_number: &str) -> Result<SyncOutcome, SyncError> {
        self.synchroniser.synchronise(prisoner_number).await
    }

    async fn page_count(&self) -> Result<u64, SyncError> {
        let api = self.builder.prison_api();
        let total = self
            .builder
            .retry()
            .run("count_prisoners", || api.count_prisoners())
            .await?;
        Ok(total.div_ceil(self.page_size))
    }

    async fn page_numbers(&self, page: u64) -> Result<Vec<String>, SyncError> {
        let api = self.builder.prison_api();
        Ok(self
            .builder
            .retry()
            .run("prisoner_numbers", || api.prisoner_numbers(page, self.page_size))
            .await?)
    }

    async fn get_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<Option<PrisonerDocument>, SyncError> {
        Ok(self
            .builder
            .retry()
            .run("get_document", || {
                self.documents.get_document(index, prisoner_number)
            })
            .await?)
    }

    /// The completed current index, used as the fallback source for enrichment
    /// fields while rebuilding `target`.
    fn fallback_index(status: &IndexStatus, target: SyncIndex) -> Option<SyncIndex> {
        (status.current_index != SyncIndex::None
            && status.current_index != target
            && status.current_index_state == IndexState::Completed)
            .then_some(status.current_index)
    }
}

#[async_trait]
impl JobHandler for IngestionPipeline {
    async fn handle(&self, job: &IndexJob) -> Result<(), SyncError> {
        match job {
            IndexJob::PopulatePage { page, target } => {
                self.populate_page(*page, *target).await.map(|_| ())
            }
            IndexJob::RefreshPage { page } => self.refresh_page(*page).await.map(|_| ()),
            IndexJob::IndexPrisoner { prisoner_number } => {
                self.refresh_one(prisoner_number).await.map(|_| ())
            }
        }
    }
}
