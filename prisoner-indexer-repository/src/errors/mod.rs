//! Error types for the prisoner indexer repository.
//!
//! `SearchIndexError` covers the document store, `RepositoryError` the
//! relational stores (index status and dedup hashes).

mod repository_error;
mod search_index_error;

pub use repository_error::RepositoryError;
pub use search_index_error::SearchIndexError;
