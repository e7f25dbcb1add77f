//! Applying inbound change notifications.

use async_trait::async_trait;
use tracing::{info, instrument};

use super::synchroniser::PrisonerSynchroniser;
use crate::consumer::DomainNotification;
use crate::errors::SyncError;
use crate::orchestrator::NotificationHandler;

#[async_trait]
impl NotificationHandler for PrisonerSynchroniser {
    #[instrument(skip(self), fields(key = ?notification.key()))]
    async fn handle(&self, notification: &DomainNotification) -> Result<(), SyncError> {
        match notification {
            DomainNotification::PrisonerChanged {
                prisoner_number, ..
            } => {
                self.synchronise(prisoner_number).await?;
            }
            DomainNotification::BookingChanged {
                event_type,
                booking_id,
            } => {
                let api = self.builder().prison_api();
                let prisoner_number = self
                    .builder()
                    .retry()
                    .run("prisoner_number_for_booking", || {
                        api.prisoner_number_for_booking(*booking_id)
                    })
                    .await?;
                match prisoner_number {
                    Some(prisoner_number) => {
                        self.synchronise(&prisoner_number).await?;
                    }
                    None => info!(
                        booking_id = booking_id,
                        event_type = %event_type,
                        event = "booking_not_found",
                        "No prisoner for booking, skipping notification"
                    ),
                }
            }
            DomainNotification::PrisonerDeleted { prisoner_number } => {
                self.delete(prisoner_number).await?;
            }
            DomainNotification::PrisonerMerged {
                prisoner_number,
                removed_prisoner_number,
            } => {
                self.synchronise(prisoner_number).await?;
                self.delete(removed_prisoner_number).await?;
            }
        }
        Ok(())
    }
}
