//! Inbound notification types.
//!
//! Notifications arrive wrapped in a topic envelope whose `Message` is itself
//! JSON. The shape of the inner message depends on the `eventType` attribute:
//! legacy prison events carry `offenderIdDisplay` and/or `bookingId`, domain
//! events carry `additionalInformation` and a `personReference`.

use serde::Deserialize;

use crate::errors::IngestError;
use crate::notifier::PersonReference;

/// The outer envelope of an inbound notification.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "MessageAttributes")]
    pub message_attributes: MessageAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageAttributes {
    #[serde(rename = "eventType")]
    pub event_type: StringAttribute,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringAttribute {
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PrisonEventMessage {
    offender_id_display: Option<String>,
    booking_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DomainEventMessage {
    additional_information: AdditionalInformation,
    person_reference: PersonReference,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AdditionalInformation {
    noms_number: Option<String>,
    removed_noms_number: Option<String>,
}

/// Events keyed by prisoner number.
const OFFENDER_EVENTS: &[&str] = &[
    "OFFENDER-INSERTED",
    "OFFENDER-UPDATED",
    "OFFENDER_DETAILS-CHANGED",
    "OFFENDER_ALIAS-CHANGED",
    "OFFENDER_PHYSICAL_DETAILS-CHANGED",
    "OFFENDER_IDENTIFIER-UPDATED",
    "OFFENDER_CONTACT-INSERTED",
    "OFFENDER_CONTACT-UPDATED",
    "OFFENDER_CONTACT-DELETED",
    "OFFENDER_ADDRESS-INSERTED",
    "OFFENDER_ADDRESS-UPDATED",
    "OFFENDER_ADDRESS-DELETED",
];

/// Events keyed by booking, or by prisoner number when the message carries one.
const BOOKING_EVENTS: &[&str] = &[
    "OFFENDER_BOOKING-CHANGED",
    "OFFENDER_BOOKING-REASSIGNED",
    "BOOKING_NUMBER-CHANGED",
    "SENTENCE_DATES-CHANGED",
    "IMPRISONMENT_STATUS-CHANGED",
    "BED_ASSIGNMENT_HISTORY-INSERTED",
    "CONFIRMED_RELEASE_DATE-CHANGED",
    "ASSESSMENT-CHANGED",
    "EXTERNAL_MOVEMENT_RECORD-INSERTED",
    "EXTERNAL_MOVEMENT-CHANGED",
    "ALERT-INSERTED",
    "ALERT-UPDATED",
    "ALERT-DELETED",
];

const OFFENDER_DELETED: &str = "OFFENDER-DELETED";
const PRISONER_MERGED: &str = "prison-offender-events.prisoner.merged";
const DOMAIN_EVENT_PREFIXES: &[&str] = &["incentives.iep-review.", "restricted-patients.patient."];

/// A recognised change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainNotification {
    /// Something about the prisoner changed.
    PrisonerChanged {
        event_type: String,
        prisoner_number: String,
    },
    /// Something about a booking changed; the prisoner must be looked up.
    BookingChanged { event_type: String, booking_id: i64 },
    /// The prisoner was deleted upstream.
    PrisonerDeleted { prisoner_number: String },
    /// Two prisoner records were merged into `prisoner_number`.
    PrisonerMerged {
        prisoner_number: String,
        removed_prisoner_number: String,
    },
}

/// How notifications are grouped so that work for one key runs in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotificationKey {
    Prisoner(String),
    Booking(i64),
}

impl DomainNotification {
    pub fn key(&self) -> NotificationKey {
        match self {
            DomainNotification::PrisonerChanged {
                prisoner_number, ..
            }
            | DomainNotification::PrisonerDeleted { prisoner_number }
            | DomainNotification::PrisonerMerged {
                prisoner_number, ..
            } => NotificationKey::Prisoner(prisoner_number.clone()),
            DomainNotification::BookingChanged { booking_id, .. } => {
                NotificationKey::Booking(*booking_id)
            }
        }
    }

    /// Parse the inner message of a notification with the given event type.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(notification))` - A recognised notification
    /// * `Ok(None)` - The event type is not one the indexer handles
    /// * `Err(IngestError)` - A recognised event type with a malformed message
    pub fn parse(event_type: &str, message: &str) -> Result<Option<Self>, IngestError> {
        if OFFENDER_EVENTS.contains(&event_type) {
            let parsed: PrisonEventMessage = parse_json(event_type, message)?;
            let prisoner_number = parsed
                .offender_id_display
                .ok_or_else(|| missing(event_type, "offenderIdDisplay"))?;
            return Ok(Some(DomainNotification::PrisonerChanged {
                event_type: event_type.to_string(),
                prisoner_number,
            }));
        }

        if BOOKING_EVENTS.contains(&event_type) {
            let parsed: PrisonEventMessage = parse_json(event_type, message)?;
            let notification = match (parsed.offender_id_display, parsed.booking_id) {
                (Some(prisoner_number), _) => DomainNotification::PrisonerChanged {
                    event_type: event_type.to_string(),
                    prisoner_number,
                },
                (None, Some(booking_id)) => DomainNotification::BookingChanged {
                    event_type: event_type.to_string(),
                    booking_id,
                },
                (None, None) => return Err(missing(event_type, "offenderIdDisplay or bookingId")),
            };
            return Ok(Some(notification));
        }

        if event_type == OFFENDER_DELETED {
            let parsed: PrisonEventMessage = parse_json(event_type, message)?;
            let prisoner_number = parsed
                .offender_id_display
                .ok_or_else(|| missing(event_type, "offenderIdDisplay"))?;
            return Ok(Some(DomainNotification::PrisonerDeleted { prisoner_number }));
        }

        if event_type == PRISONER_MERGED {
            let parsed: DomainEventMessage = parse_json(event_type, message)?;
            let info = parsed.additional_information;
            let prisoner_number = info
                .noms_number
                .ok_or_else(|| missing(event_type, "additionalInformation.nomsNumber"))?;
            let removed_prisoner_number = info
                .removed_noms_number
                .ok_or_else(|| missing(event_type, "additionalInformation.removedNomsNumber"))?;
            return Ok(Some(DomainNotification::PrisonerMerged {
                prisoner_number,
                removed_prisoner_number,
            }));
        }

        if DOMAIN_EVENT_PREFIXES
            .iter()
            .any(|prefix| event_type.starts_with(prefix))
        {
            let parsed: DomainEventMessage = parse_json(event_type, message)?;
            let prisoner_number = parsed
                .additional_information
                .noms_number
                .or_else(|| parsed.person_reference.noms_number().map(str::to_string))
                .ok_or_else(|| missing(event_type, "nomsNumber"))?;
            return Ok(Some(DomainNotification::PrisonerChanged {
                event_type: event_type.to_string(),
                prisoner_number,
            }));
        }

        Ok(None)
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(event_type: &str, message: &str) -> Result<T, IngestError> {
    serde_json::from_str(message)
        .map_err(|e| IngestError::parse(format!("Invalid {} message: {}", event_type, e)))
}

fn missing(event_type: &str, field: &str) -> IngestError {
    IngestError::parse(format!("{} message has no {}", event_type, field))
}

/// Position of a consumed message, committed once its batch is acknowledged.
pub type MessageOffset = (String, i32, i64);

/// Messages that flow between the consumer and the orchestrator.
#[derive(Debug)]
pub enum StreamMessage {
    /// A batch of notifications with the offsets that produced them.
    Notifications {
        notifications: Vec<DomainNotification>,
        offsets: Vec<MessageOffset>,
    },
    /// Whether a batch was fully processed.
    Acknowledgment {
        offsets: Vec<MessageOffset>,
        success: bool,
        error: Option<String>,
    },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}
