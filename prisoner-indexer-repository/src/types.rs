//! Request and response types for repository operations.

use crate::errors::SearchIndexError;

/// Result of a batch operation for a single document.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The prisoner number the document is keyed by.
    pub prisoner_number: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// Lets callers handle partial failures: one bad document does not fail the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from individual results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

/// Notification stream a dedup hash belongs to.
///
/// Each stream keeps one row per prisoner number in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashStream {
    /// Hash of the published prisoner document (gates created/updated events).
    Document,
    /// Hash of the published transition events (movements, alerts, convicted status).
    Event,
}

impl HashStream {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            HashStream::Document => "prisoner_document_hash",
            HashStream::Event => "prisoner_event_hash",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_results() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult {
                prisoner_number: "A1111AA".to_string(),
                success: true,
                error: None,
            },
            BatchOperationResult {
                prisoner_number: "A2222AA".to_string(),
                success: false,
                error: Some(SearchIndexError::index("mapping conflict")),
            },
        ]);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_hash_streams_use_separate_tables() {
        assert_ne!(HashStream::Document.table(), HashStream::Event.table());
    }
}
