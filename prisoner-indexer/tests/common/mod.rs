//! Shared harness for integration tests: the full service wired over
//! in-memory stores, a mock prison API and a recording publisher.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;

use prisoner_indexer::ingest::{spawn_workers, DocumentBuilder, IngestionPipeline, JobHandler, JobQueue};
use prisoner_indexer::lifecycle::IndexLifecycleManager;
use prisoner_indexer::notifier::RecordingPublisher;
use prisoner_indexer::retry::RetryPolicy;
use prisoner_indexer::sync::{DedupGate, PrisonerSynchroniser};
use prisoner_indexer::upstream::{MockPrisonApi, OffenderBooking};
use prisoner_indexer_repository::{
    InMemoryDocumentIndex, InMemoryEntityHashRepository, InMemoryIndexStatusRepository,
};
use prisoner_indexer_shared::{PrisonerDocument, SyncIndex};

pub const PAGE_SIZE: u64 = 2;

pub struct TestHarness {
    pub api: Arc<MockPrisonApi>,
    pub documents: Arc<InMemoryDocumentIndex>,
    pub statuses: Arc<InMemoryIndexStatusRepository>,
    pub hashes: Arc<InMemoryEntityHashRepository>,
    pub publisher: Arc<RecordingPublisher>,
    pub lifecycle: Arc<IndexLifecycleManager>,
    pub synchroniser: Arc<PrisonerSynchroniser>,
    pub pipeline: Arc<IngestionPipeline>,
    pub workers: Vec<JoinHandle<()>>,
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_secs(1))
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_threshold(0)
    }

    pub fn with_threshold(complete_threshold: u64) -> Self {
        let api = Arc::new(MockPrisonApi::new());
        let documents = Arc::new(InMemoryDocumentIndex::new());
        let statuses = Arc::new(InMemoryIndexStatusRepository::new());
        let hashes = Arc::new(InMemoryEntityHashRepository::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let retry = fast_retry();

        let builder = DocumentBuilder::new(api.clone(), retry.clone());
        let lifecycle = Arc::new(IndexLifecycleManager::new(
            statuses.clone(),
            documents.clone(),
            complete_threshold,
        ));
        let synchroniser = Arc::new(PrisonerSynchroniser::new(
            builder.clone(),
            documents.clone(),
            lifecycle.clone(),
            DedupGate::new(hashes.clone(), retry.clone()),
            publisher.clone(),
            retry,
        ));

        let (queue, receiver) = JobQueue::new(100);
        let pipeline = Arc::new(IngestionPipeline::new(
            builder,
            documents.clone(),
            lifecycle.clone(),
            synchroniser.clone(),
            queue.clone(),
            PAGE_SIZE,
        ));
        let handler: Arc<dyn JobHandler> = pipeline.clone();
        let workers = spawn_workers(2, receiver, queue, handler, 3);

        Self {
            api,
            documents,
            statuses,
            hashes,
            publisher,
            lifecycle,
            synchroniser,
            pipeline,
            workers,
        }
    }

    /// Build the other index from the mock population and make it current.
    pub async fn build_index(&self) {
        self.lifecycle.prepare_for_rebuild().await.unwrap();
        self.pipeline.populate_full().await.unwrap();
        self.pipeline.queue().wait_until_idle().await;
        self.lifecycle.mark_complete(false).await.unwrap();
    }

    pub async fn indexed(&self, index: SyncIndex, prisoner_number: &str) -> Option<PrisonerDocument> {
        self.documents
            .documents(index)
            .await
            .into_iter()
            .find(|doc| doc.prisoner_number == prisoner_number)
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// An active prisoner currently in `prison_id`.
pub fn offender(prisoner_number: &str, booking_id: i64, prison_id: &str) -> OffenderBooking {
    OffenderBooking {
        offender_no: prisoner_number.to_string(),
        booking_id: Some(booking_id),
        booking_no: Some(format!("{}B", booking_id)),
        first_name: "JOHN".to_string(),
        last_name: "SMITH".to_string(),
        active_flag: true,
        agency_id: Some(prison_id.to_string()),
        in_out_status: Some("IN".to_string()),
        last_movement_type_code: Some("ADM".to_string()),
        last_movement_reason_code: Some("INT".to_string()),
        convicted_status: Some("Convicted".to_string()),
        ..Default::default()
    }
}

pub fn movement_time(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
}
