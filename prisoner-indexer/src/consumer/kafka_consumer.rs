//! Kafka consumer for inbound prisoner change notifications.
//!
//! Consumes notification envelopes, batches the recognised ones for the
//! orchestrator and commits offsets only once a batch is acknowledged.
//! Malformed notifications are forwarded to a dead-letter topic.
//!
//! One batch is in flight at a time. Nothing more is read until the
//! orchestrator answers; a rejected batch rewinds each of its partitions to the
//! batch's first offset, so the same messages are delivered again.

use std::collections::BTreeMap;
use std::time::Duration;

use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Message as KafkaMessage},
    producer::{FutureProducer, FutureRecord},
    Offset, TopicPartitionList,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::messages::{
    DomainNotification, MessageOffset, NotificationEnvelope, StreamMessage,
};
use crate::errors::IngestError;
use crate::notifier::create_producer;

/// Default batch size for Kafka message batching.
const DEFAULT_BATCH_SIZE: usize = 50;

/// Default batch timeout in milliseconds.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

/// How long a dead-letter send may wait in the producer queue.
const DEAD_LETTER_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a partition rewind may take.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka consumer for change notifications.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    dead_letters: FutureProducer,
    topic: String,
    dead_letter_topic: String,
    batch_size: usize,
    batch_timeout: Duration,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - Topic carrying change notifications
    /// * `dead_letter_topic` - Topic receiving notifications that cannot be parsed
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaConsumer)` - A new consumer instance
    /// * `Err(IngestError)` - If consumer creation fails
    pub fn new(
        brokers: &str,
        group_id: &str,
        topic: &str,
        dead_letter_topic: &str,
    ) -> Result<Self, IngestError> {
        Self::with_batch_config(
            brokers,
            group_id,
            topic,
            dead_letter_topic,
            DEFAULT_BATCH_SIZE,
            DEFAULT_BATCH_TIMEOUT_MS,
        )
    }

    /// Create a new Kafka consumer with custom batch configuration.
    ///
    /// `batch_timeout_ms` is the longest a partial batch waits before it is
    /// handed to the orchestrator.
    pub fn with_batch_config(
        brokers: &str,
        group_id: &str,
        topic: &str,
        dead_letter_topic: &str,
        batch_size: usize,
        batch_timeout_ms: u64,
    ) -> Result<Self, IngestError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| IngestError::kafka(e.to_string()))?;
        let dead_letters = create_producer(brokers, "prisoner-indexer-dead-letters")?;

        info!(
            brokers = %brokers,
            group_id = %group_id,
            topic = %topic,
            dead_letter_topic = %dead_letter_topic,
            batch_size = batch_size,
            batch_timeout_ms = batch_timeout_ms,
            "Created Kafka consumer with batching"
        );

        Ok(Self {
            consumer,
            dead_letters,
            topic: topic.to_string(),
            dead_letter_topic: dead_letter_topic.to_string(),
            batch_size: batch_size.max(1),
            batch_timeout: Duration::from_millis(batch_timeout_ms),
        })
    }

    /// Subscribe to the notification topic.
    pub fn subscribe(&self) -> Result<(), IngestError> {
        self.consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(topic = %self.topic, "Subscribed to Kafka topic");
        Ok(())
    }

    /// Start consuming messages and send batches through the channel.
    ///
    /// # Arguments
    ///
    /// * `sender` - Channel to send batches to
    /// * `ack_receiver` - Channel to receive acknowledgments from the orchestrator
    /// * `shutdown` - Shutdown signal receiver
    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    pub async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        use futures::StreamExt;

        let mut message_stream = self.consumer.stream();
        let mut notifications: Vec<DomainNotification> = Vec::with_capacity(self.batch_size);
        let mut pending_offsets: Vec<MessageOffset> = Vec::new();
        let mut in_flight = false;
        let mut flush_timer = tokio::time::interval(self.batch_timeout);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Skip the first tick immediately
        flush_timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    // Uncommitted messages are re-read from the last committed offset on restart
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { offsets, success, error }) => {
                            in_flight = false;
                            if success {
                                if let Err(e) = self.commit_offsets(&offsets) {
                                    error!(error = %e, "Failed to commit offsets after acknowledgment");
                                } else {
                                    debug!(offset_count = offsets.len(), "Committed offsets after successful processing");
                                }
                            } else {
                                warn!(
                                    offset_count = offsets.len(),
                                    error = error.as_deref().unwrap_or("Unknown error"),
                                    "Batch rejected, rewinding for redelivery"
                                );
                                // Continuing past an unrewound partition would let a
                                // later commit skip the rejected messages.
                                self.rewind(&offsets)?;
                            }
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {}
                    }
                }
                message = message_stream.next(), if !in_flight => {
                    match message {
                        Some(Ok(msg)) => {
                            debug!(
                                topic = %msg.topic(),
                                partition = msg.partition(),
                                offset = msg.offset(),
                                "Received message from Kafka"
                            );
                            // Dropped and dead-lettered messages still carry their
                            // offset so it is committed with the surrounding batch.
                            if let Some(notification) = self.handle_message(&msg).await? {
                                notifications.push(notification);
                            }
                            pending_offsets.push((msg.topic().to_string(), msg.partition(), msg.offset()));

                            if pending_offsets.len() >= self.batch_size {
                                in_flight = Self::flush_batch(&mut notifications, &mut pending_offsets, &sender).await?;
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            Self::flush_batch(&mut notifications, &mut pending_offsets, &sender).await?;
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
                _ = flush_timer.tick(), if !in_flight => {
                    if !pending_offsets.is_empty() {
                        debug!(count = pending_offsets.len(), "Flushing batch due to timeout");
                        in_flight = Self::flush_batch(&mut notifications, &mut pending_offsets, &sender).await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Parse one message, dead-lettering it if it is malformed.
    async fn handle_message(
        &self,
        msg: &BorrowedMessage<'_>,
    ) -> Result<Option<DomainNotification>, IngestError> {
        let payload = match msg.payload() {
            Some(p) => p,
            None => {
                debug!(offset = msg.offset(), "Received message with empty payload");
                return Ok(None);
            }
        };

        match parse_payload(payload) {
            Ok(Some(notification)) => Ok(Some(notification)),
            Ok(None) => Ok(None),
            Err(e) => {
                error!(
                    topic = %msg.topic(),
                    partition = msg.partition(),
                    offset = msg.offset(),
                    payload = %String::from_utf8_lossy(payload),
                    error = %e,
                    event = "notification_dead_lettered",
                    "Failed to parse notification"
                );
                self.dead_letter(msg, payload).await?;
                Ok(None)
            }
        }
    }

    async fn dead_letter(&self, msg: &BorrowedMessage<'_>, payload: &[u8]) -> Result<(), IngestError> {
        let mut record = FutureRecord::to(&self.dead_letter_topic).payload(payload);
        if let Some(key) = msg.key() {
            record = record.key(key);
        }
        self.dead_letters
            .send(record, DEAD_LETTER_TIMEOUT)
            .await
            .map_err(|(e, _)| IngestError::kafka(format!("dead-letter send failed: {}", e)))?;
        Ok(())
    }

    /// Hand the pending batch to the orchestrator, returning whether one was sent.
    async fn flush_batch(
        notifications: &mut Vec<DomainNotification>,
        offsets: &mut Vec<MessageOffset>,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<bool, IngestError> {
        if offsets.is_empty() {
            return Ok(false);
        }

        info!(
            notification_count = notifications.len(),
            offset_count = offsets.len(),
            "Sending batch of notifications to orchestrator"
        );
        sender
            .send(StreamMessage::Notifications {
                notifications: std::mem::take(notifications),
                offsets: std::mem::take(offsets),
            })
            .await
            .map_err(|e| IngestError::ChannelError(e.to_string()))?;
        Ok(true)
    }

    /// Commit offsets for a batch of messages.
    fn commit_offsets(&self, offsets: &[MessageOffset]) -> Result<(), IngestError> {
        if offsets.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), next) in commit_positions(offsets) {
            tpl.add_partition_offset(&topic, partition, Offset::Offset(next))
                .map_err(|e| IngestError::kafka(e.to_string()))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        Ok(())
    }

    /// Move every partition of a rejected batch back to its first offset.
    fn rewind(&self, offsets: &[MessageOffset]) -> Result<(), IngestError> {
        for ((topic, partition), first) in rewind_positions(offsets) {
            self.consumer
                .seek(&topic, partition, Offset::Offset(first), SEEK_TIMEOUT)
                .map_err(|e| IngestError::kafka(format!("seek failed: {}", e)))?;
            info!(
                topic = %topic,
                partition = partition,
                offset = first,
                "Rewound partition for redelivery"
            );
        }
        Ok(())
    }
}

/// The next offset to commit per partition: one past the highest acknowledged.
fn commit_positions(offsets: &[MessageOffset]) -> BTreeMap<(String, i32), i64> {
    let mut positions: BTreeMap<(String, i32), i64> = BTreeMap::new();
    for (topic, partition, offset) in offsets {
        let next = positions.entry((topic.clone(), *partition)).or_insert(offset + 1);
        *next = (*next).max(offset + 1);
    }
    positions
}

/// Where to resume each partition of a rejected batch: its lowest offset.
fn rewind_positions(offsets: &[MessageOffset]) -> BTreeMap<(String, i32), i64> {
    let mut positions: BTreeMap<(String, i32), i64> = BTreeMap::new();
    for (topic, partition, offset) in offsets {
        let first = positions.entry((topic.clone(), *partition)).or_insert(*offset);
        *first = (*first).min(*offset);
    }
    positions
}

/// Parse a raw envelope payload into a notification.
///
/// Unrecognised event types are logged and dropped.
fn parse_payload(payload: &[u8]) -> Result<Option<DomainNotification>, IngestError> {
    let envelope: NotificationEnvelope = serde_json::from_slice(payload)
        .map_err(|e| IngestError::parse(format!("Invalid notification envelope: {}", e)))?;
    let event_type = envelope.message_attributes.event_type.value.as_str();

    let notification = DomainNotification::parse(event_type, &envelope.message)?;
    if notification.is_none() {
        warn!(
            event_type = %event_type,
            message_id = %envelope.message_id,
            event = "notification_ignored",
            "Ignoring unrecognised notification"
        );
    }
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(event_type: &str, message: &str) -> Vec<u8> {
        serde_json::json!({
            "Message": message,
            "MessageId": "5b5e4a3a-0d1c-4a0e-9b6c-6a9d0d0f1c11",
            "MessageAttributes": { "eventType": { "Type": "String", "Value": event_type } }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BATCH_SIZE, 50);
        assert_eq!(DEFAULT_BATCH_TIMEOUT_MS, 1000);
    }

    #[test]
    fn test_parse_payload_recognised() {
        let payload = envelope("OFFENDER_ALIAS-CHANGED", r#"{"offenderIdDisplay":"A1234AA"}"#);
        assert_eq!(
            parse_payload(&payload).unwrap(),
            Some(DomainNotification::PrisonerChanged {
                event_type: "OFFENDER_ALIAS-CHANGED".to_string(),
                prisoner_number: "A1234AA".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_payload_ignores_unknown_types() {
        let payload = envelope("SOMETHING-ELSE", "{}");
        assert_eq!(parse_payload(&payload).unwrap(), None);
    }

    #[test]
    fn test_parse_payload_rejects_malformed() {
        assert!(parse_payload(b"not json").is_err());
        assert!(parse_payload(&envelope("OFFENDER-UPDATED", "{}")).is_err());
    }

    fn offset(topic: &str, partition: i32, offset: i64) -> MessageOffset {
        (topic.to_string(), partition, offset)
    }

    #[test]
    fn test_positions_per_partition() {
        let batch = vec![
            offset("prisoner.offender.events", 0, 7),
            offset("prisoner.offender.events", 1, 3),
            offset("prisoner.offender.events", 0, 5),
            offset("prisoner.offender.events", 0, 6),
            offset("prisoner.domain.events", 0, 11),
        ];

        let commit = commit_positions(&batch);
        assert_eq!(commit.len(), 3);
        assert_eq!(commit[&("prisoner.offender.events".to_string(), 0)], 8);
        assert_eq!(commit[&("prisoner.offender.events".to_string(), 1)], 4);
        assert_eq!(commit[&("prisoner.domain.events".to_string(), 0)], 12);

        let rewind = rewind_positions(&batch);
        assert_eq!(rewind.len(), 3);
        assert_eq!(rewind[&("prisoner.offender.events".to_string(), 0)], 5);
        assert_eq!(rewind[&("prisoner.offender.events".to_string(), 1)], 3);
        assert_eq!(rewind[&("prisoner.domain.events".to_string(), 0)], 11);
    }

    #[test]
    fn test_rejected_batch_is_read_again_before_commit() {
        // A single partition read two messages at a time, with the middle batch
        // rejected once.
        let topic = "prisoner.offender.events";
        let log_end = 6_i64;
        let mut position = 0_i64;
        let mut committed = 0_i64;
        let mut rejections_left = 1;
        let mut delivered = Vec::new();

        while position < log_end {
            let batch: Vec<MessageOffset> = (position..(position + 2).min(log_end))
                .map(|o| offset(topic, 0, o))
                .collect();
            delivered.push(batch.iter().map(|(_, _, o)| *o).collect::<Vec<_>>());
            position += batch.len() as i64;

            if position == 4 && rejections_left > 0 {
                rejections_left -= 1;
                position = rewind_positions(&batch)[&(topic.to_string(), 0)];
                assert_eq!(committed, 2, "nothing past the rejected batch is committed");
                continue;
            }
            committed = commit_positions(&batch)[&(topic.to_string(), 0)];
        }

        assert_eq!(delivered, vec![vec![0, 1], vec![2, 3], vec![2, 3], vec![4, 5]]);
        assert_eq!(committed, 6);
    }
}
