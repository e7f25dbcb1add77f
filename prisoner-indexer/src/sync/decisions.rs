//! Event decisions for one prisoner update.
//!
//! Everything here is pure: given the previously indexed document and the new
//! one, decide which events should be published. Deduplication and publishing
//! happen afterwards in the synchroniser.

use chrono::NaiveDateTime;

use prisoner_indexer_shared::{PrisonerDocument, PrisonerEvent};

use super::difference::{changed_categories, Difference};
use super::movement::{classify, Classification, MovementSnapshot};

/// The events decided for one update.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDecisions {
    /// Created or updated, gated on the document hash.
    pub document_event: Option<PrisonerEvent>,
    /// Movement, alert and convicted status events, gated together on the
    /// event hash.
    pub transition_events: Vec<PrisonerEvent>,
    /// Movement classification, kept for logging.
    pub movement: Classification,
}

/// Decide every event for an update from `before` to `after`.
pub fn decide(
    before: Option<&PrisonerDocument>,
    after: &PrisonerDocument,
    differences: &[Difference],
    now: NaiveDateTime,
) -> EventDecisions {
    let before_snapshot = before.map(MovementSnapshot::from);
    let movement = classify(
        before_snapshot.as_ref(),
        &MovementSnapshot::from(after),
        after.last_merged_at(),
        now,
    );

    let mut transition_events = Vec::new();
    if let Classification::Movement(change) = movement {
        transition_events.push(change.to_event(before, after));
    }
    transition_events.extend(alerts_event(before, after));
    transition_events.extend(convicted_status_event(before, after));

    EventDecisions {
        document_event: document_event(before, after, differences),
        transition_events,
        movement,
    }
}

/// Created for a first index, updated when any category changed.
pub fn document_event(
    before: Option<&PrisonerDocument>,
    after: &PrisonerDocument,
    differences: &[Difference],
) -> Option<PrisonerEvent> {
    let prisoner_number = after.prisoner_number.clone();
    match before {
        None => Some(PrisonerEvent::Created { prisoner_number }),
        Some(_) if differences.is_empty() => None,
        Some(_) => Some(PrisonerEvent::Updated {
            prisoner_number,
            categories_changed: changed_categories(differences),
        }),
    }
}

/// Added and removed active alert codes.
///
/// A first index publishes no alert event; the created event covers it.
pub fn alerts_event(
    before: Option<&PrisonerDocument>,
    after: &PrisonerDocument,
) -> Option<PrisonerEvent> {
    let previous = before?.active_alert_codes();
    let current = after.active_alert_codes();

    let alerts_added: Vec<String> = current.difference(&previous).cloned().collect();
    let alerts_removed: Vec<String> = previous.difference(&current).cloned().collect();
    if alerts_added.is_empty() && alerts_removed.is_empty() {
        return None;
    }

    Some(PrisonerEvent::AlertsUpdated {
        prisoner_number: after.prisoner_number.clone(),
        booking_id: after.booking_id.clone(),
        alerts_added,
        alerts_removed,
    })
}

pub fn convicted_status_event(
    before: Option<&PrisonerDocument>,
    after: &PrisonerDocument,
) -> Option<PrisonerEvent> {
    let before = before?;
    (before.convicted_status != after.convicted_status).then(|| {
        PrisonerEvent::ConvictedStatusChanged {
            prisoner_number: after.prisoner_number.clone(),
            convicted_status: after.convicted_status.clone(),
        }
    })
}
