//! Search index error types.
//!
//! This module defines the unified error type for all document store operations,
//! covering both document CRUD and index/alias administration.

use thiserror::Error;

/// Unified errors from document store operations.
///
/// Used by the `DocumentIndexProvider` trait for all operations. `Unavailable`
/// and `ConnectionError` are transient: the call site may retry them a bounded
/// number of times.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., missing document id, unknown physical index).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to establish connection to the search index backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The backend answered with a retryable status (429, 502, 503, 504).
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Bulk indexing operation had failures.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create or delete a physical index.
    #[error("Index administration error: {0}")]
    IndexAdminError(String),

    /// Failed to read or repoint the alias.
    #[error("Alias error: {0}")]
    AliasError(String),

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search index backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Document not found.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create an index administration error.
    pub fn index_admin(msg: impl Into<String>) -> Self {
        Self::IndexAdminError(msg.into())
    }

    /// Create an alias error.
    pub fn alias(msg: impl Into<String>) -> Self {
        Self::AliasError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a document not found error.
    pub fn document_not_found(index: &str, id: &str) -> Self {
        Self::DocumentNotFound(format!("index={}, id={}", index, id))
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Map a non-success HTTP status to an error, classifying retryable statuses
    /// as `Unavailable` and everything else with `otherwise`.
    pub fn from_status(
        status: u16,
        body: &str,
        otherwise: fn(String) -> SearchIndexError,
    ) -> Self {
        let msg = format!("status {}: {}", status, body);
        match status {
            429 | 502 | 503 | 504 => Self::Unavailable(msg),
            _ => otherwise(msg),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classifies_gateway_errors_as_transient() {
        for status in [429u16, 502, 503, 504] {
            let err = SearchIndexError::from_status(status, "busy", SearchIndexError::IndexError);
            assert!(err.is_transient(), "status {} should be transient", status);
        }
    }

    #[test]
    fn test_from_status_uses_fallback_for_other_statuses() {
        let err = SearchIndexError::from_status(400, "bad mapping", SearchIndexError::IndexError);
        assert!(matches!(err, SearchIndexError::IndexError(_)));
        assert!(!err.is_transient());
    }
}
