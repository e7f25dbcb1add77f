use thiserror::Error;

use prisoner_indexer_repository::{RepositoryError, SearchIndexError};
use prisoner_indexer_shared::IndexStatus;

/// Errors from index lifecycle transitions.
///
/// Guard violations carry the status that failed the guard; no state was
/// changed when one is returned.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("A rebuild is already in progress")]
    BuildAlreadyInProgress(IndexStatus),

    #[error("No rebuild is in progress")]
    BuildNotInProgress(IndexStatus),

    #[error("Index holds {count} documents, below the threshold of {threshold}")]
    ThresholdNotReached {
        count: u64,
        threshold: u64,
        status: IndexStatus,
    },

    #[error("Both indices must be complete to switch")]
    BuildIncomplete(IndexStatus),

    #[error("No index is currently active")]
    NoActiveIndices(IndexStatus),

    #[error("Index status kept changing; gave up after {0} attempts")]
    ConcurrentModification(usize),

    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl LifecycleError {
    /// The unchanged status attached to a guard violation.
    pub fn status(&self) -> Option<&IndexStatus> {
        match self {
            Self::BuildAlreadyInProgress(status)
            | Self::BuildNotInProgress(status)
            | Self::BuildIncomplete(status)
            | Self::NoActiveIndices(status)
            | Self::ThresholdNotReached { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Whether this is an expected guard violation rather than a failure.
    pub fn is_conflict(&self) -> bool {
        self.status().is_some() || matches!(self, Self::ConcurrentModification(_))
    }
}
