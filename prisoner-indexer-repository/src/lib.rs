//! # Prisoner Indexer Repository
//!
//! This crate provides traits and implementations for the storage boundaries of
//! the prisoner indexer:
//!
//! - [`DocumentIndexProvider`]: document CRUD plus index and alias administration,
//!   implemented for OpenSearch.
//! - [`IndexStatusRepository`]: the singleton blue/green status record, updated
//!   through compare-and-swap, implemented for PostgreSQL.
//! - [`EntityHashRepository`]: the dedup store of last-published hashes,
//!   implemented for PostgreSQL.
//!
//! In-memory implementations of all three live in [`memory`] for tests and
//! local runs.

// The index mapping is one large `json!` literal.
#![recursion_limit = "256"]

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod types;

pub use errors::{RepositoryError, SearchIndexError};
pub use interfaces::{DocumentIndexProvider, EntityHashRepository, IndexStatusRepository};
pub use memory::{InMemoryDocumentIndex, InMemoryEntityHashRepository, InMemoryIndexStatusRepository};
pub use opensearch::OpenSearchProvider;
pub use postgres::{run_migrations, PostgresEntityHashRepository, PostgresIndexStatusRepository};
pub use types::{BatchOperationResult, BatchOperationSummary, HashStream};
