//! Orchestrator for inbound change notifications.
//!
//! Runs the consumer, dispatches each batch of notifications to a
//! [`NotificationHandler`] and acknowledges the batch only when every
//! notification in it was applied.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{DomainNotification, KafkaConsumer, NotificationKey, StreamMessage};
use crate::errors::{IngestError, SyncError};

/// A source of notification batches.
#[async_trait]
pub trait Consumer: Send + Sync {
    fn subscribe(&self) -> Result<(), IngestError>;

    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::Receiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;
}

#[async_trait]
impl Consumer for KafkaConsumer {
    fn subscribe(&self) -> Result<(), IngestError> {
        KafkaConsumer::subscribe(self)
    }

    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::Receiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        KafkaConsumer::run(self, sender, ack_receiver, shutdown).await
    }
}

/// Applies a single notification.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, notification: &DomainNotification) -> Result<(), SyncError>;
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// How often throughput is logged.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            progress_interval: Duration::from_secs(10),
        }
    }
}

pub struct Orchestrator<C: Consumer + 'static> {
    consumer: Arc<C>,
    handler: Arc<dyn NotificationHandler>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    /// Notifications applied since startup.
    total_processed: Arc<AtomicU64>,
    /// Notifications that failed since startup.
    total_failed: Arc<AtomicU64>,
}

impl<C: Consumer + 'static> Orchestrator<C> {
    pub fn new(consumer: C, handler: Arc<dyn NotificationHandler>) -> Self {
        Self::with_config(consumer, handler, OrchestratorConfig::default())
    }

    pub fn with_config(
        consumer: C,
        handler: Arc<dyn NotificationHandler>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer: Arc::new(consumer),
            handler,
            config,
            shutdown_tx,
            total_processed: Arc::new(AtomicU64::new(0)),
            total_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Relaxed)
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::Relaxed)
    }

    /// Run until the consumer ends or a shutdown signal is received.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), IngestError> {
        info!("Starting prisoner indexer orchestrator");

        self.consumer.subscribe()?;

        let (batch_transmitter, mut batch_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);
        let (ack_transmitter, ack_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let consumer = self.consumer.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer
                .run(batch_transmitter, ack_receiver, shutdown_rx)
                .await
            {
                error!(error = %e, "Consumer error");
            }
        });

        info!("Ready to process notifications");

        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut prev_processed: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        loop {
            tokio::select! {
                msg = batch_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Notifications { notifications, offsets }) => {
                            debug!(
                                notification_count = notifications.len(),
                                offset_count = offsets.len(),
                                "Received notifications from consumer"
                            );
                            let ack = match self.process_batch(notifications).await {
                                Ok(()) => StreamMessage::Acknowledgment {
                                    offsets,
                                    success: true,
                                    error: None,
                                },
                                Err(e) => {
                                    error!(error = %e, "Failed to apply batch. Sending NACK to broker");
                                    StreamMessage::Acknowledgment {
                                        offsets,
                                        success: false,
                                        error: Some(e.to_string()),
                                    }
                                }
                            };
                            let _ = ack_transmitter.send(ack).await;
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on batch channel");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = progress_timer.tick() => {
                    let processed = self.total_processed();
                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let per_sec = if elapsed_secs > 0.0 {
                        (processed.saturating_sub(prev_processed) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        notifications_processed = processed,
                        notifications_failed = self.total_failed(),
                        notifications_per_sec = format!("{:.2}", per_sec),
                        "Processing progress"
                    );

                    prev_processed = processed;
                    prev_time = now;
                }
            }
        }

        // Unacknowledged batches are re-consumed on the next start.
        drop(ack_transmitter);
        let _ = consumer_handle.await;

        info!(
            total_processed = self.total_processed(),
            total_failed = self.total_failed(),
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Apply a batch. Notifications sharing a key run in order; different
    /// keys run concurrently. Fails if any notification failed.
    async fn process_batch(&self, notifications: Vec<DomainNotification>) -> Result<(), IngestError> {
        let groups = group_by_key(notifications);
        let results = join_all(groups.into_values().map(|group| self.process_group(group))).await;

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(IngestError::from(e)),
            None => Ok(()),
        }
    }

    async fn process_group(&self, group: Vec<DomainNotification>) -> Result<(), SyncError> {
        for notification in &group {
            match self.handler.handle(notification).await {
                Ok(()) => {
                    self.total_processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.total_failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        key = ?notification.key(),
                        error = %e,
                        event = "notification_failed",
                        "Failed to apply notification"
                    );
                    // Later notifications for this key wait for redelivery.
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Group notifications by key, keeping arrival order within each group.
pub fn group_by_key(
    notifications: Vec<DomainNotification>,
) -> BTreeMap<NotificationKey, Vec<DomainNotification>> {
    let mut groups: BTreeMap<NotificationKey, Vec<DomainNotification>> = BTreeMap::new();
    for notification in notifications {
        groups.entry(notification.key()).or_default().push(notification);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(prisoner_number: &str, event_type: &str) -> DomainNotification {
        DomainNotification::PrisonerChanged {
            event_type: event_type.to_string(),
            prisoner_number: prisoner_number.to_string(),
        }
    }

    #[test]
    fn test_group_by_key_keeps_order_within_group() {
        let groups = group_by_key(vec![
            changed("A1234AA", "OFFENDER-UPDATED"),
            changed("B2222BB", "ALERT-INSERTED"),
            DomainNotification::PrisonerDeleted {
                prisoner_number: "A1234AA".to_string(),
            },
            DomainNotification::BookingChanged {
                event_type: "SENTENCE_DATES-CHANGED".to_string(),
                booking_id: 7,
            },
        ]);

        assert_eq!(groups.len(), 3);
        let first = &groups[&NotificationKey::Prisoner("A1234AA".to_string())];
        assert_eq!(first.len(), 2);
        assert!(matches!(first[0], DomainNotification::PrisonerChanged { .. }));
        assert!(matches!(first[1], DomainNotification::PrisonerDeleted { .. }));
        assert_eq!(groups[&NotificationKey::Booking(7)].len(), 1);
    }
}
