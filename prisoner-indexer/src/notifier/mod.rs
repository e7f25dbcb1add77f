//! Outbound notifier.
//!
//! Decided, deduplicated events leave the service through an [`EventPublisher`].
//! Production publishes JSON domain envelopes to Kafka; tests record events in
//! memory.

mod envelope;
mod kafka_publisher;
mod recording;

pub use envelope::{DomainEventEnvelope, PersonIdentifier, PersonReference};
pub use kafka_publisher::{create_producer, KafkaEventPublisher};
pub use recording::RecordingPublisher;

use async_trait::async_trait;

use crate::errors::PublishError;
use prisoner_indexer_shared::PrisonerEvent;

/// Publishes domain events to downstream consumers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &PrisonerEvent) -> Result<(), PublishError>;
}
