//! Interface definitions for the repository boundaries.
//!
//! These traits allow for dependency injection and swappable backends: the
//! production wiring uses OpenSearch and PostgreSQL, tests use [`crate::memory`].

mod document_index_provider;
mod entity_hash_repository;
mod index_status_repository;

pub use document_index_provider::DocumentIndexProvider;
pub use entity_hash_repository::EntityHashRepository;
pub use index_status_repository::IndexStatusRepository;
