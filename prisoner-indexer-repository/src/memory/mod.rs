//! In-memory implementations of the repository traits.
//!
//! Used by unit and integration tests and for running the indexer locally
//! without OpenSearch or PostgreSQL. Each implementation offers small failure
//! injection hooks so callers can exercise their retry and error paths.

mod document_index;
mod entity_hash_repository;
mod index_status_repository;

pub use document_index::InMemoryDocumentIndex;
pub use entity_hash_repository::InMemoryEntityHashRepository;
pub use index_status_repository::InMemoryIndexStatusRepository;
