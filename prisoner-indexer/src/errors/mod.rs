//! Error types for the prisoner indexer service.

mod ingest;
mod lifecycle;
mod publish;
mod sync;
mod upstream;

pub use ingest::IngestError;
pub use lifecycle::LifecycleError;
pub use publish::PublishError;
pub use sync::SyncError;
pub use upstream::UpstreamError;
