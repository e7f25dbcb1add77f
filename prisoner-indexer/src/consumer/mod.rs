//! Consumer module for inbound change notifications.
//!
//! Provides Kafka consumer functionality for receiving prisoner change
//! notifications and dead-lettering the ones that cannot be parsed.

mod kafka_consumer;
mod messages;

pub use kafka_consumer::KafkaConsumer;
pub use messages::{
    DomainNotification, MessageAttributes, MessageOffset, NotificationEnvelope, NotificationKey,
    StreamMessage, StringAttribute,
};
