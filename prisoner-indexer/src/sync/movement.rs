//! Movement classification.
//!
//! Given the previously indexed document and the newly built one, decide which
//! admission or release movement (if any) took place. Rules are evaluated in
//! order and the first match wins.

use chrono::{Duration, NaiveDateTime};

use prisoner_indexer_shared::{PrisonerDocument, PrisonerEvent, ReceiveReason, ReleaseReason};

const IN: &str = "IN";
const TRANSFER: &str = "TRN";
const ACTIVE_IN: &str = "ACTIVE IN";
const ACTIVE_OUT: &str = "ACTIVE OUT";
const INACTIVE_OUT: &str = "INACTIVE OUT";

const ADMISSION: &str = "ADM";
const COURT: &str = "CRT";
const TEMPORARY_ABSENCE: &str = "TAP";
const RELEASE: &str = "REL";

const TRANSFER_VIA_COURT: &str = "TRNCRT";
const TRANSFER_VIA_TAP: &str = "TRNTAP";
const HOSPITAL: &str = "HP";

/// How far back a merge may have been recorded when the booking carries no
/// movement time.
///
/// Open correctness gap, awaiting a decision from the product owner: the window
/// is a heuristic and misclassifies a booking move as a merge admission when an
/// unrelated merge was recorded shortly before it. Its bounds are kept as they
/// are until that decision is made.
pub const MERGE_WINDOW_MINUTES: i64 = 90;

/// The fields of a document that take part in movement classification.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementSnapshot<'a> {
    pub in_out_status: Option<&'a str>,
    pub status: Option<&'a str>,
    pub last_movement_type_code: Option<&'a str>,
    pub last_movement_reason_code: Option<&'a str>,
    pub booking_id: Option<&'a str>,
    pub prison_id: Option<&'a str>,
    pub active: bool,
    pub last_movement_at: Option<NaiveDateTime>,
}

impl<'a> From<&'a PrisonerDocument> for MovementSnapshot<'a> {
    fn from(document: &'a PrisonerDocument) -> Self {
        Self {
            in_out_status: document.in_out_status.as_deref(),
            status: document.status.as_deref(),
            last_movement_type_code: document.last_movement_type_code.as_deref(),
            last_movement_reason_code: document.last_movement_reason_code.as_deref(),
            booking_id: document.booking_id.as_deref(),
            prison_id: document.prison_id.as_deref(),
            active: document.active,
            last_movement_at: document.last_movement_at,
        }
    }
}

impl MovementSnapshot<'_> {
    fn has_status(&self, status: &str) -> bool {
        self.status == Some(status)
    }

    fn has_movement_type(&self, code: &str) -> bool {
        self.last_movement_type_code == Some(code)
    }

    fn has_movement_reason(&self, code: &str) -> bool {
        self.last_movement_reason_code == Some(code)
    }

    fn is_admitted(&self) -> bool {
        self.has_movement_type(ADMISSION) && self.has_status(ACTIVE_IN)
    }

    fn is_released(&self) -> bool {
        self.has_movement_type(RELEASE) && self.has_status(INACTIVE_OUT)
    }
}

/// A classified movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementChange {
    TransferIn,
    TransferInViaCourt,
    TransferInViaTemporaryAbsence,
    CourtReturn,
    TemporaryAbsenceReturn,
    NewAdmission,
    Readmission,
    ReadmissionSwitchBooking,
    PostMergeAdmission,
    AdmissionOnBookingMove,
    TransferOut,
    CourtOut,
    TemporaryAbsenceOut,
    Release,
    ReleaseToHospital,
}

/// Outcome of classifying a pair of snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Movement(MovementChange),
    /// In/out status changed but no rule matched.
    Unknown,
    None,
}

enum Direction {
    Received(ReceiveReason),
    Released(ReleaseReason),
}

impl MovementChange {
    fn direction(self) -> Direction {
        use Direction::{Received, Released};
        match self {
            MovementChange::TransferIn
            | MovementChange::TransferInViaCourt
            | MovementChange::TransferInViaTemporaryAbsence => {
                Received(ReceiveReason::Transferred)
            }
            MovementChange::CourtReturn => Received(ReceiveReason::ReturnFromCourt),
            MovementChange::TemporaryAbsenceReturn => {
                Received(ReceiveReason::TemporaryAbsenceReturn)
            }
            MovementChange::NewAdmission => Received(ReceiveReason::NewAdmission),
            MovementChange::Readmission => Received(ReceiveReason::Readmission),
            MovementChange::ReadmissionSwitchBooking => {
                Received(ReceiveReason::ReadmissionSwitchBooking)
            }
            MovementChange::PostMergeAdmission => Received(ReceiveReason::PostMergeAdmission),
            MovementChange::AdmissionOnBookingMove => {
                Received(ReceiveReason::AdmissionOnBookingMove)
            }
            MovementChange::TransferOut => Released(ReleaseReason::Transferred),
            MovementChange::CourtOut => Released(ReleaseReason::SentToCourt),
            MovementChange::TemporaryAbsenceOut => {
                Released(ReleaseReason::TemporaryAbsenceRelease)
            }
            MovementChange::Release => Released(ReleaseReason::Released),
            MovementChange::ReleaseToHospital => Released(ReleaseReason::ReleasedToHospital),
        }
    }

    /// The event published for this movement.
    ///
    /// Receptions report the prison the prisoner arrived at, releases the
    /// prison they left.
    pub fn to_event(
        self,
        before: Option<&PrisonerDocument>,
        after: &PrisonerDocument,
    ) -> PrisonerEvent {
        let prisoner_number = after.prisoner_number.clone();
        match self.direction() {
            Direction::Received(reason) => PrisonerEvent::Received {
                prisoner_number,
                prison_id: after.prison_id.clone().unwrap_or_default(),
                reason,
            },
            Direction::Released(reason) => PrisonerEvent::Released {
                prisoner_number,
                prison_id: before
                    .and_then(|doc| doc.prison_id.clone())
                    .or_else(|| after.prison_id.clone())
                    .unwrap_or_default(),
                reason,
            },
        }
    }
}

/// Classify the movement between `before` and `after`.
///
/// `merged_at` is the most recent merge recorded against the prisoner and `now`
/// is the evaluation time, both in the naive time the upstream records use.
pub fn classify(
    before: Option<&MovementSnapshot>,
    after: &MovementSnapshot,
    merged_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Classification {
    if let Some(change) = match_rule(before, after, merged_at, now) {
        return Classification::Movement(change);
    }
    match before {
        Some(before) if before.in_out_status != after.in_out_status => Classification::Unknown,
        _ => Classification::None,
    }
}

fn match_rule(
    before: Option<&MovementSnapshot>,
    after: &MovementSnapshot,
    merged_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Option<MovementChange> {
    if let Some(before) = before {
        if before.in_out_status == Some(TRANSFER) && after.in_out_status == Some(IN) {
            return Some(MovementChange::TransferIn);
        }
        if is_transfer_via(before, after, COURT, TRANSFER_VIA_COURT) {
            return Some(MovementChange::TransferInViaCourt);
        }
        if is_transfer_via(before, after, TEMPORARY_ABSENCE, TRANSFER_VIA_TAP) {
            return Some(MovementChange::TransferInViaTemporaryAbsence);
        }
        if is_return(before, after, COURT) {
            return Some(MovementChange::CourtReturn);
        }
        if is_return(before, after, TEMPORARY_ABSENCE) {
            return Some(MovementChange::TemporaryAbsenceReturn);
        }
    }

    let booking_appeared = before.map_or(true, |before| {
        before.booking_id.is_none() && after.booking_id.is_some()
    });
    if booking_appeared && after.is_admitted() {
        return Some(MovementChange::NewAdmission);
    }

    let before = before?;
    let booking_changed = before.booking_id != after.booking_id;

    if before.has_status(INACTIVE_OUT) && after.is_admitted() {
        return Some(if booking_changed {
            MovementChange::ReadmissionSwitchBooking
        } else {
            MovementChange::Readmission
        });
    }
    if booking_changed
        && [ADMISSION, TEMPORARY_ABSENCE, COURT]
            .iter()
            .any(|code| after.has_movement_type(code))
        && merged_after_movement(after, merged_at, now)
    {
        return Some(MovementChange::PostMergeAdmission);
    }
    if booking_changed && after.has_status(ACTIVE_IN) {
        return Some(MovementChange::AdmissionOnBookingMove);
    }

    if before.in_out_status == Some(IN) && after.in_out_status == Some(TRANSFER) {
        return Some(MovementChange::TransferOut);
    }
    if is_departure(before, after, COURT) {
        return Some(MovementChange::CourtOut);
    }
    if is_departure(before, after, TEMPORARY_ABSENCE) {
        return Some(MovementChange::TemporaryAbsenceOut);
    }
    if before.active && after.is_released() {
        return Some(if after.has_movement_reason(HOSPITAL) {
            MovementChange::ReleaseToHospital
        } else {
            MovementChange::Release
        });
    }
    None
}

fn is_transfer_via(
    before: &MovementSnapshot,
    after: &MovementSnapshot,
    via: &str,
    reason: &str,
) -> bool {
    before.has_status(ACTIVE_OUT)
        && before.has_movement_type(via)
        && after.is_admitted()
        && after.has_movement_reason(reason)
}

fn is_return(before: &MovementSnapshot, after: &MovementSnapshot, movement_type: &str) -> bool {
    before.has_status(ACTIVE_OUT)
        && after.has_status(ACTIVE_IN)
        && after.has_movement_type(movement_type)
}

fn is_departure(before: &MovementSnapshot, after: &MovementSnapshot, movement_type: &str) -> bool {
    before.has_status(ACTIVE_IN)
        && after.has_status(ACTIVE_OUT)
        && after.has_movement_type(movement_type)
}

fn merged_after_movement(
    after: &MovementSnapshot,
    merged_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> bool {
    let Some(merged_at) = merged_at else {
        return false;
    };
    match after.last_movement_at {
        Some(movement_at) => merged_at >= movement_at,
        None => merged_at >= now - Duration::minutes(MERGE_WINDOW_MINUTES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn snapshot<'a>(
        status: &'a str,
        movement_type: Option<&'a str>,
        movement_reason: Option<&'a str>,
        booking_id: Option<&'a str>,
    ) -> MovementSnapshot<'a> {
        MovementSnapshot {
            in_out_status: status.split(' ').nth(1),
            status: Some(status),
            last_movement_type_code: movement_type,
            last_movement_reason_code: movement_reason,
            booking_id,
            prison_id: Some("MDI"),
            active: status.starts_with("ACTIVE"),
            last_movement_at: None,
        }
    }

    fn run(before: Option<&MovementSnapshot>, after: &MovementSnapshot) -> Classification {
        classify(before, after, None, at(12, 0))
    }

    #[test]
    fn test_transfer_in() {
        let before = MovementSnapshot {
            in_out_status: Some("TRN"),
            ..Default::default()
        };
        let after = MovementSnapshot {
            in_out_status: Some("IN"),
            ..Default::default()
        };

        assert_eq!(
            run(Some(&before), &after),
            Classification::Movement(MovementChange::TransferIn)
        );
    }

    #[test]
    fn test_readmission_on_same_booking() {
        let before = MovementSnapshot {
            status: Some("INACTIVE OUT"),
            booking_id: Some("1"),
            ..Default::default()
        };
        let after = MovementSnapshot {
            status: Some("ACTIVE IN"),
            last_movement_type_code: Some("ADM"),
            booking_id: Some("1"),
            ..Default::default()
        };

        assert_eq!(
            run(Some(&before), &after),
            Classification::Movement(MovementChange::Readmission)
        );
    }

    #[test]
    fn test_readmission_switching_booking() {
        let before = snapshot("INACTIVE OUT", Some("REL"), None, Some("1"));
        let after = snapshot("ACTIVE IN", Some("ADM"), None, Some("2"));

        assert_eq!(
            run(Some(&before), &after),
            Classification::Movement(MovementChange::ReadmissionSwitchBooking)
        );
    }

    #[test]
    fn test_transfer_in_via_court_and_tap() {
        let after_court = snapshot("ACTIVE IN", Some("ADM"), Some("TRNCRT"), Some("1"));
        let before_court = snapshot("ACTIVE OUT", Some("CRT"), None, Some("1"));
        assert_eq!(
            run(Some(&before_court), &after_court),
            Classification::Movement(MovementChange::TransferInViaCourt)
        );

        let after_tap = snapshot("ACTIVE IN", Some("ADM"), Some("TRNTAP"), Some("1"));
        let before_tap = snapshot("ACTIVE OUT", Some("TAP"), None, Some("1"));
        assert_eq!(
            run(Some(&before_tap), &after_tap),
            Classification::Movement(MovementChange::TransferInViaTemporaryAbsence)
        );
    }

    #[test]
    fn test_returns() {
        let before = snapshot("ACTIVE OUT", Some("CRT"), None, Some("1"));
        let court = snapshot("ACTIVE IN", Some("CRT"), None, Some("1"));
        let tap = snapshot("ACTIVE IN", Some("TAP"), None, Some("1"));

        assert_eq!(
            run(Some(&before), &court),
            Classification::Movement(MovementChange::CourtReturn)
        );
        assert_eq!(
            run(Some(&before), &tap),
            Classification::Movement(MovementChange::TemporaryAbsenceReturn)
        );
    }

    #[test]
    fn test_new_admission() {
        let after = snapshot("ACTIVE IN", Some("ADM"), None, Some("1"));
        assert_eq!(
            run(None, &after),
            Classification::Movement(MovementChange::NewAdmission)
        );

        let before = snapshot("INACTIVE OUT", None, None, None);
        assert_eq!(
            run(Some(&before), &after),
            Classification::Movement(MovementChange::NewAdmission)
        );
    }

    #[test]
    fn test_post_merge_admission_uses_movement_time() {
        let before = snapshot("ACTIVE IN", Some("ADM"), None, Some("1"));
        let mut after = snapshot("ACTIVE IN", Some("ADM"), None, Some("2"));
        after.last_movement_at = Some(at(9, 0));

        assert_eq!(
            classify(Some(&before), &after, Some(at(9, 30)), at(12, 0)),
            Classification::Movement(MovementChange::PostMergeAdmission)
        );
        // merge recorded before the movement: just a booking move
        assert_eq!(
            classify(Some(&before), &after, Some(at(8, 0)), at(12, 0)),
            Classification::Movement(MovementChange::AdmissionOnBookingMove)
        );
    }

    #[test]
    fn test_post_merge_admission_window_without_movement_time() {
        let before = snapshot("ACTIVE IN", Some("ADM"), None, Some("1"));
        let after = snapshot("ACTIVE IN", Some("TAP"), None, Some("2"));

        assert_eq!(
            classify(Some(&before), &after, Some(at(10, 30)), at(12, 0)),
            Classification::Movement(MovementChange::PostMergeAdmission)
        );
        assert_eq!(
            classify(Some(&before), &after, Some(at(10, 29)), at(12, 0)),
            Classification::Movement(MovementChange::AdmissionOnBookingMove)
        );
        assert_eq!(
            classify(Some(&before), &after, None, at(12, 0)),
            Classification::Movement(MovementChange::AdmissionOnBookingMove)
        );
    }

    #[test]
    fn test_departures() {
        let before = snapshot("ACTIVE IN", Some("ADM"), None, Some("1"));

        let transfer = MovementSnapshot {
            in_out_status: Some("TRN"),
            ..snapshot("ACTIVE TRN", Some("TRN"), None, Some("1"))
        };
        assert_eq!(
            run(Some(&before), &transfer),
            Classification::Movement(MovementChange::TransferOut)
        );

        let court = snapshot("ACTIVE OUT", Some("CRT"), None, Some("1"));
        assert_eq!(
            run(Some(&before), &court),
            Classification::Movement(MovementChange::CourtOut)
        );

        let tap = snapshot("ACTIVE OUT", Some("TAP"), None, Some("1"));
        assert_eq!(
            run(Some(&before), &tap),
            Classification::Movement(MovementChange::TemporaryAbsenceOut)
        );
    }

    #[test]
    fn test_releases() {
        let before = snapshot("ACTIVE IN", Some("ADM"), None, Some("1"));

        let released = snapshot("INACTIVE OUT", Some("REL"), Some("CR"), Some("1"));
        assert_eq!(
            run(Some(&before), &released),
            Classification::Movement(MovementChange::Release)
        );

        let hospital = snapshot("INACTIVE OUT", Some("REL"), Some("HP"), Some("1"));
        assert_eq!(
            run(Some(&before), &hospital),
            Classification::Movement(MovementChange::ReleaseToHospital)
        );
    }

    #[test]
    fn test_unmatched_in_out_change_is_unknown() {
        let before = snapshot("ACTIVE IN", Some("ADM"), None, Some("1"));
        let after = snapshot("ACTIVE OUT", Some("ESCP"), None, Some("1"));

        assert_eq!(run(Some(&before), &after), Classification::Unknown);
    }

    #[test]
    fn test_unchanged_snapshot_is_no_movement() {
        let before = snapshot("ACTIVE IN", Some("ADM"), None, Some("1"));

        assert_eq!(run(Some(&before), &before), Classification::None);
        assert_eq!(
            run(None, &snapshot("INACTIVE OUT", Some("REL"), None, Some("1"))),
            Classification::None
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let before = snapshot("ACTIVE OUT", Some("CRT"), None, Some("1"));
        let after = snapshot("ACTIVE IN", Some("CRT"), None, Some("1"));

        let first = run(Some(&before), &after);
        for _ in 0..10 {
            assert_eq!(run(Some(&before), &after), first);
        }
    }

    #[test]
    fn test_event_prisons() {
        let mut before = PrisonerDocument::new("A1234AA");
        before.prison_id = Some("MDI".to_string());
        let mut after = PrisonerDocument::new("A1234AA");
        after.prison_id = Some("LEI".to_string());

        assert_eq!(
            MovementChange::TransferIn.to_event(Some(&before), &after),
            PrisonerEvent::Received {
                prisoner_number: "A1234AA".to_string(),
                prison_id: "LEI".to_string(),
                reason: ReceiveReason::Transferred,
            }
        );
        assert_eq!(
            MovementChange::TransferOut.to_event(Some(&before), &after),
            PrisonerEvent::Released {
                prisoner_number: "A1234AA".to_string(),
                prison_id: "MDI".to_string(),
                reason: ReleaseReason::Transferred,
            }
        );
    }
}
