use thiserror::Error;

use crate::errors::{LifecycleError, PublishError, UpstreamError};
use prisoner_indexer_repository::{RepositoryError, SearchIndexError};

/// Errors from synchronising prisoners into the index.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// A job could not be handed to the worker pool.
    #[error("Job queue error: {0}")]
    Queue(String),

    /// The prisoner does not exist upstream.
    #[error("Prisoner {0} not found")]
    NotFound(String),
}

impl SyncError {
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }
}
