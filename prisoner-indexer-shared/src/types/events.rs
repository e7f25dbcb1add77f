//! Outbound domain events.
//!
//! Each variant carries the prisoner number plus the fields specific to that
//! kind of change. Movement events carry exactly the prison and a reason code.

use serde::{Deserialize, Serialize};

use crate::types::diff_category::DiffCategory;

/// Why a prisoner was received into a prison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiveReason {
    NewAdmission,
    Readmission,
    ReadmissionSwitchBooking,
    Transferred,
    ReturnFromCourt,
    TemporaryAbsenceReturn,
    PostMergeAdmission,
    AdmissionOnBookingMove,
}

impl ReceiveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiveReason::NewAdmission => "NEW_ADMISSION",
            ReceiveReason::Readmission => "READMISSION",
            ReceiveReason::ReadmissionSwitchBooking => "READMISSION_SWITCH_BOOKING",
            ReceiveReason::Transferred => "TRANSFERRED",
            ReceiveReason::ReturnFromCourt => "RETURN_FROM_COURT",
            ReceiveReason::TemporaryAbsenceReturn => "TEMPORARY_ABSENCE_RETURN",
            ReceiveReason::PostMergeAdmission => "POST_MERGE_ADMISSION",
            ReceiveReason::AdmissionOnBookingMove => "ADMISSION_ON_BOOKING_MOVE",
        }
    }
}

/// Why a prisoner left a prison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseReason {
    TemporaryAbsenceRelease,
    ReleasedToHospital,
    Released,
    SentToCourt,
    Transferred,
}

impl ReleaseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseReason::TemporaryAbsenceRelease => "TEMPORARY_ABSENCE_RELEASE",
            ReleaseReason::ReleasedToHospital => "RELEASED_TO_HOSPITAL",
            ReleaseReason::Released => "RELEASED",
            ReleaseReason::SentToCourt => "SENT_TO_COURT",
            ReleaseReason::Transferred => "TRANSFERRED",
        }
    }
}

/// A decided domain event, ready for deduplication and publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrisonerEvent {
    Created {
        prisoner_number: String,
    },
    Updated {
        prisoner_number: String,
        categories_changed: Vec<DiffCategory>,
    },
    Received {
        prisoner_number: String,
        prison_id: String,
        reason: ReceiveReason,
    },
    Released {
        prisoner_number: String,
        prison_id: String,
        reason: ReleaseReason,
    },
    AlertsUpdated {
        prisoner_number: String,
        booking_id: Option<String>,
        alerts_added: Vec<String>,
        alerts_removed: Vec<String>,
    },
    ConvictedStatusChanged {
        prisoner_number: String,
        convicted_status: Option<String>,
    },
    Removed {
        prisoner_number: String,
    },
}

impl PrisonerEvent {
    /// The published event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            PrisonerEvent::Created { .. } => "prisoner-search.prisoner.created",
            PrisonerEvent::Updated { .. } => "prisoner-search.prisoner.updated",
            PrisonerEvent::Received { .. } => "prisoner-search.prisoner.received",
            PrisonerEvent::Released { .. } => "prisoner-search.prisoner.released",
            PrisonerEvent::AlertsUpdated { .. } => "prisoner-search.prisoner.alerts-updated",
            PrisonerEvent::ConvictedStatusChanged { .. } => {
                "prisoner-search.prisoner.convicted-status-changed"
            }
            PrisonerEvent::Removed { .. } => "prisoner-search.prisoner.removed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PrisonerEvent::Created { .. } => "A prisoner record has been created",
            PrisonerEvent::Updated { .. } => "A prisoner record has been updated",
            PrisonerEvent::Received { .. } => "A prisoner has been received into a prison",
            PrisonerEvent::Released { .. } => "A prisoner has been released from a prison",
            PrisonerEvent::AlertsUpdated { .. } => "A prisoner had their alerts updated",
            PrisonerEvent::ConvictedStatusChanged { .. } => {
                "A prisoner had their convicted status changed"
            }
            PrisonerEvent::Removed { .. } => "A prisoner record has been removed",
        }
    }

    pub fn prisoner_number(&self) -> &str {
        match self {
            PrisonerEvent::Created { prisoner_number }
            | PrisonerEvent::Updated { prisoner_number, .. }
            | PrisonerEvent::Received { prisoner_number, .. }
            | PrisonerEvent::Released { prisoner_number, .. }
            | PrisonerEvent::AlertsUpdated { prisoner_number, .. }
            | PrisonerEvent::ConvictedStatusChanged { prisoner_number, .. }
            | PrisonerEvent::Removed { prisoner_number } => prisoner_number,
        }
    }

    /// Whether the event describes the document as a whole (created/updated)
    /// rather than a specific transition.
    pub fn is_document_event(&self) -> bool {
        matches!(
            self,
            PrisonerEvent::Created { .. } | PrisonerEvent::Updated { .. }
        )
    }
}
