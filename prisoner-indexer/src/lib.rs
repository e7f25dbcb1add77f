//! # Prisoner Indexer
//!
//! Keeps a searchable index of prisoner records consistent with the prison
//! system of record and publishes domain events describing what changed.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Receives change notifications from Kafka
//! 2. **Orchestrator**: Groups notifications per prisoner and dispatches them
//! 3. **Sync**: Rebuilds a prisoner's document, diffs it against the indexed
//!    copy, decides and deduplicates events, writes and publishes
//! 4. **Ingest**: Full population and refresh of the index through page jobs
//! 5. **Lifecycle**: Blue/green index state, rebuilds and alias switches
//! 6. **Admin**: HTTP surface for index maintenance
//!
//! ## Modules
//!
//! - [`admin`]: Maintenance HTTP endpoints
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: Kafka consumer for change notifications
//! - [`errors`]: Error types for the indexer
//! - [`ingest`]: Document building, page jobs and the worker pool
//! - [`lifecycle`]: Blue/green index lifecycle
//! - [`notifier`]: Outbound event publishing
//! - [`orchestrator`]: Coordinates the notification flow
//! - [`retention`]: Dedup store retention
//! - [`retry`]: Bounded retry with backoff and timeouts
//! - [`sync`]: The consistency engine
//! - [`translate`]: Upstream records to index documents
//! - [`upstream`]: Prison system of record client

pub mod admin;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod ingest;
pub mod lifecycle;
pub mod notifier;
pub mod orchestrator;
pub mod retention;
pub mod retry;
pub mod sync;
pub mod translate;
pub mod upstream;

pub use config::{Dependencies, IndexerConfig};
pub use errors::IngestError;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),

    /// The admin server failed.
    #[error("Admin server error: {0}")]
    ServerError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
