use std::sync::Arc;

use crate::ingest::IngestionPipeline;
use crate::lifecycle::IndexLifecycleManager;
use prisoner_indexer_repository::EntityHashRepository;

#[derive(Clone)]
pub struct AdminState {
    pub lifecycle: Arc<IndexLifecycleManager>,
    pub pipeline: Arc<IngestionPipeline>,
    pub hashes: Arc<dyn EntityHashRepository>,
    /// Retention used when a purge request gives no `olderThanDays`.
    pub hash_retention_days: u32,
}
