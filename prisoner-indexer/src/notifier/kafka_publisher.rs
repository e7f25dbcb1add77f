//! Kafka implementation of the event publisher.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{IngestError, PublishError};
use crate::notifier::{DomainEventEnvelope, EventPublisher};
use prisoner_indexer_shared::PrisonerEvent;

/// How long a send may wait in the producer queue.
const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a producer configured for small, compressed event messages.
pub fn create_producer(broker: &str, client_id: &str) -> Result<FutureProducer, IngestError> {
    let producer = ClientConfig::new()
        .set("bootstrap.servers", broker)
        .set("client.id", client_id)
        .set("compression.type", "zstd")
        .set("message.timeout.ms", "5000")
        .set("acks", "all")
        .create()
        .map_err(|e| IngestError::kafka(e.to_string()))?;
    Ok(producer)
}

/// Publishes events to a Kafka topic keyed by prisoner number.
///
/// Keying by prisoner number keeps one prisoner's events in order on a single
/// partition.
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventPublisher {
    pub fn new(broker: &str, topic: impl Into<String>) -> Result<Self, IngestError> {
        let topic = topic.into();
        let producer = create_producer(broker, "prisoner-indexer-events")?;
        info!(broker = %broker, topic = %topic, "Created Kafka event publisher");
        Ok(Self { producer, topic })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &PrisonerEvent) -> Result<(), PublishError> {
        let envelope = DomainEventEnvelope::from_event(event, Utc::now());
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| PublishError::serialization(e.to_string()))?;
        let event_id = Uuid::new_v4().to_string();

        let record = FutureRecord::to(&self.topic)
            .key(event.prisoner_number())
            .payload(&payload)
            .headers(OwnedHeaders::new().insert(Header {
                key: "eventId",
                value: Some(event_id.as_str()),
            }));

        let (partition, offset) = self
            .producer
            .send(record, QUEUE_TIMEOUT)
            .await
            .map_err(|(e, _)| PublishError::delivery(e.to_string()))?;

        debug!(
            event_type = event.event_type(),
            prisoner_number = event.prisoner_number(),
            event_id = %event_id,
            partition = partition,
            offset = offset,
            "Published event"
        );
        Ok(())
    }
}
