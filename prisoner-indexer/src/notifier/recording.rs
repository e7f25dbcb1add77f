//! In-memory publisher for tests and local runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::PublishError;
use crate::notifier::EventPublisher;
use prisoner_indexer_shared::PrisonerEvent;

/// Records every published event.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PrisonerEvent>>,
    failures: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, in order.
    pub fn events(&self) -> Vec<PrisonerEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Published event type names, in order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event_type())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Fail the next `count` publishes.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &PrisonerEvent) -> Result<(), PublishError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PublishError::delivery("injected failure"));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
