//! Translation from upstream records to the indexed prisoner document.
//!
//! [`build_document`] is a pure function: it performs no I/O, and given the
//! same inputs always builds the same document. Enrichment lookups are passed
//! in as results so a failed lookup can fall back to the last indexed value.

use prisoner_indexer_shared::{
    CurrentIncentive, PhoneNumber, PrisonerAddress, PrisonerAlert, PrisonerAlias,
    PrisonerDocument, PrisonerIdentifier,
};

use crate::errors::UpstreamError;
use crate::upstream::{Address, OffenderBooking, RestrictedPatient};

const PNC_IDENTIFIER: &str = "PNC";
const CRO_IDENTIFIER: &str = "CRO";

/// Build a prisoner document from upstream data.
///
/// When `incentive` or `restricted_patient` is an error, the corresponding
/// fields are copied from `existing` (if any) instead of being cleared.
/// `indexed_at` is left unset; the caller stamps it when writing.
pub fn build_document(
    offender: &OffenderBooking,
    incentive: Result<Option<CurrentIncentive>, UpstreamError>,
    restricted_patient: Result<Option<RestrictedPatient>, UpstreamError>,
    existing: Option<&PrisonerDocument>,
) -> PrisonerDocument {
    let in_out_status = offender.in_out_status.clone();
    let status = format!(
        "{} {}",
        if offender.active_flag { "ACTIVE" } else { "INACTIVE" },
        in_out_status.as_deref().unwrap_or("OUT")
    );

    let mut document = PrisonerDocument {
        prisoner_number: offender.offender_no.clone(),
        pnc_number: identifier_value(offender, PNC_IDENTIFIER),
        cro_number: identifier_value(offender, CRO_IDENTIFIER),
        booking_id: offender.booking_id.map(|id| id.to_string()),
        book_number: offender.booking_no.clone(),

        first_name: offender.first_name.clone(),
        middle_names: offender.middle_name.clone(),
        last_name: offender.last_name.clone(),
        date_of_birth: offender.date_of_birth,
        gender: offender
            .physical_attributes
            .as_ref()
            .and_then(|attributes| attributes.gender.clone()),
        ethnicity: offender
            .physical_attributes
            .as_ref()
            .and_then(|attributes| attributes.ethnicity.clone()),
        nationality: profile_value(offender, "NAT"),
        religion: profile_value(offender, "RELF"),
        marital_status: profile_value(offender, "MARITAL"),
        aliases: offender
            .aliases
            .iter()
            .map(|alias| PrisonerAlias {
                first_name: alias.first_name.clone(),
                middle_names: alias.middle_name.clone(),
                last_name: alias.last_name.clone(),
                date_of_birth: alias.dob,
                gender: alias.gender.clone(),
            })
            .collect(),
        identifiers: offender
            .identifiers
            .iter()
            .map(|identifier| PrisonerIdentifier {
                identifier_type: identifier.identifier_type.clone(),
                value: identifier.value.clone(),
                issued_date: identifier.issued_date,
                created_at: identifier.when_created,
            })
            .collect(),

        active: offender.active_flag,
        status: Some(status),
        in_out_status,
        last_movement_type_code: offender.last_movement_type_code.clone(),
        last_movement_reason_code: offender.last_movement_reason_code.clone(),
        last_movement_at: offender.last_movement_time,

        prison_id: offender.agency_id.clone(),
        prison_name: offender.agency_description.clone(),
        cell_location: offender
            .assigned_living_unit
            .as_ref()
            .and_then(|unit| unit.description.clone()),

        legal_status: offender.legal_status.clone(),
        imprisonment_status: offender.imprisonment_status.clone(),
        convicted_status: offender.convicted_status.clone(),
        recall: offender.recall,
        indeterminate_sentence: offender.indeterminate_sentence,
        most_serious_offence: offender
            .offence_history
            .iter()
            .find(|offence| offence.most_serious)
            .map(|offence| offence.offence_description.clone()),

        alerts: offender
            .alerts
            .iter()
            .map(|alert| PrisonerAlert {
                alert_type: alert.alert_type.clone(),
                alert_code: alert.alert_code.clone(),
                active: alert.active,
                expired: alert.expired,
            })
            .collect(),

        addresses: offender.addresses.iter().map(to_address).collect(),
        email_addresses: offender
            .email_addresses
            .iter()
            .map(|email| email.email.clone())
            .collect(),
        phone_numbers: offender
            .phones
            .iter()
            .map(|phone| PhoneNumber {
                phone_type: phone.phone_type.clone(),
                number: phone.number.clone(),
            })
            .collect(),

        height_centimetres: offender
            .physical_attributes
            .as_ref()
            .and_then(|attributes| attributes.height_centimetres),
        weight_kilograms: offender
            .physical_attributes
            .as_ref()
            .and_then(|attributes| attributes.weight_kilograms),
        hair_colour: characteristic(offender, "HAIR"),
        eye_colour: characteristic(offender, "R_EYE_C"),
        build: characteristic(offender, "BUILD"),
        distinguishing_marks: offender
            .physical_marks
            .iter()
            .map(|mark| match &mark.body_part {
                Some(body_part) => format!("{}: {}", mark.mark_type, body_part),
                None => mark.mark_type.clone(),
            })
            .collect(),

        ..Default::default()
    };

    if let Some(sentence) = &offender.sentence_detail {
        document.sentence_start_date = sentence.sentence_start_date;
        document.release_date = sentence.release_date;
        document.confirmed_release_date = sentence.confirmed_release_date;
        document.conditional_release_date = sentence.conditional_release_date;
        document.parole_eligibility_date = sentence.parole_eligibility_date;
        document.home_detention_curfew_eligibility_date =
            sentence.home_detention_curfew_eligibility_date;
        document.licence_expiry_date = sentence.licence_expiry_date;
        document.sentence_expiry_date = sentence.sentence_expiry_date;
    }

    document.current_incentive = match incentive {
        Ok(incentive) => incentive,
        Err(_) => existing.and_then(|existing| existing.current_incentive.clone()),
    };

    match restricted_patient {
        Ok(Some(patient)) => {
            document.restricted_patient = true;
            document.supporting_prison_id = patient.supporting_prison_id;
            document.discharged_hospital_id = patient.hospital_location_code;
            document.discharge_date = patient.discharge_time.map(|time| time.date());
        }
        Ok(None) => {}
        Err(_) => {
            if let Some(existing) = existing {
                document.restricted_patient = existing.restricted_patient;
                document.supporting_prison_id = existing.supporting_prison_id.clone();
                document.discharged_hospital_id = existing.discharged_hospital_id.clone();
                document.discharge_date = existing.discharge_date;
            }
        }
    }

    document
}

fn identifier_value(offender: &OffenderBooking, identifier_type: &str) -> Option<String> {
    offender
        .identifiers
        .iter()
        .find(|identifier| identifier.identifier_type == identifier_type)
        .map(|identifier| identifier.value.clone())
}

fn profile_value(offender: &OffenderBooking, profile_type: &str) -> Option<String> {
    offender
        .profile_information
        .iter()
        .find(|profile| profile.profile_type == profile_type)
        .and_then(|profile| profile.result_value.clone())
}

fn characteristic(offender: &OffenderBooking, characteristic_type: &str) -> Option<String> {
    offender
        .physical_characteristics
        .iter()
        .find(|characteristic| characteristic.characteristic_type == characteristic_type)
        .and_then(|characteristic| characteristic.detail.clone())
}

fn to_address(address: &Address) -> PrisonerAddress {
    let full_address = [
        &address.flat,
        &address.premise,
        &address.street,
        &address.town,
        &address.postal_code,
    ]
    .into_iter()
    .flatten()
    .map(|part| part.trim())
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    PrisonerAddress {
        full_address,
        postal_code: address.postal_code.clone(),
        start_date: address.start_date,
        primary_address: address.primary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{Alert, OffenderIdentifier, ProfileInformation};
    use chrono::NaiveDate;
    use prisoner_indexer_shared::IncentiveLevel;

    fn offender() -> OffenderBooking {
        OffenderBooking {
            offender_no: "A1234AA".to_string(),
            booking_id: Some(1200),
            first_name: "JOHN".to_string(),
            last_name: "SMITH".to_string(),
            active_flag: true,
            in_out_status: Some("IN".to_string()),
            agency_id: Some("MDI".to_string()),
            identifiers: vec![OffenderIdentifier {
                identifier_type: "PNC".to_string(),
                value: "12/394773H".to_string(),
                ..Default::default()
            }],
            profile_information: vec![ProfileInformation {
                profile_type: "NAT".to_string(),
                result_value: Some("British".to_string()),
            }],
            alerts: vec![Alert {
                alert_type: "X".to_string(),
                alert_code: "XA".to_string(),
                active: true,
                expired: false,
            }],
            ..Default::default()
        }
    }

    fn incentive(code: &str) -> CurrentIncentive {
        CurrentIncentive {
            level: IncentiveLevel {
                code: code.to_string(),
                description: code.to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_derived_fields() {
        let document = build_document(&offender(), Ok(None), Ok(None), None);

        assert_eq!(document.prisoner_number, "A1234AA");
        assert_eq!(document.booking_id.as_deref(), Some("1200"));
        assert_eq!(document.status.as_deref(), Some("ACTIVE IN"));
        assert_eq!(document.pnc_number.as_deref(), Some("12/394773H"));
        assert_eq!(document.nationality.as_deref(), Some("British"));
        assert_eq!(document.prison_id.as_deref(), Some("MDI"));
        assert_eq!(document.alerts.len(), 1);
        assert!(!document.restricted_patient);
        assert!(document.indexed_at.is_none());
    }

    #[test]
    fn test_inactive_prisoner_status() {
        let mut released = offender();
        released.active_flag = false;
        released.in_out_status = Some("OUT".to_string());

        let document = build_document(&released, Ok(None), Ok(None), None);
        assert_eq!(document.status.as_deref(), Some("INACTIVE OUT"));
    }

    #[test]
    fn test_failed_enrichment_falls_back_to_existing() {
        let mut existing = PrisonerDocument::new("A1234AA");
        existing.current_incentive = Some(incentive("ENH"));
        existing.restricted_patient = true;
        existing.supporting_prison_id = Some("LEI".to_string());

        let document = build_document(
            &offender(),
            Err(UpstreamError::transport("down")),
            Err(UpstreamError::transport("down")),
            Some(&existing),
        );

        assert_eq!(document.current_incentive, Some(incentive("ENH")));
        assert!(document.restricted_patient);
        assert_eq!(document.supporting_prison_id.as_deref(), Some("LEI"));
    }

    #[test]
    fn test_successful_enrichment_replaces_existing() {
        let mut existing = PrisonerDocument::new("A1234AA");
        existing.current_incentive = Some(incentive("ENH"));
        existing.restricted_patient = true;

        let document = build_document(
            &offender(),
            Ok(Some(incentive("STD"))),
            Ok(None),
            Some(&existing),
        );

        assert_eq!(document.current_incentive, Some(incentive("STD")));
        assert!(!document.restricted_patient);
    }

    #[test]
    fn test_restricted_patient_fields() {
        let discharge = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let patient = RestrictedPatient {
            supporting_prison_id: Some("MDI".to_string()),
            hospital_location_code: Some("HOSPITAL1".to_string()),
            discharge_time: Some(discharge),
        };

        let document = build_document(&offender(), Ok(None), Ok(Some(patient)), None);

        assert!(document.restricted_patient);
        assert_eq!(document.discharged_hospital_id.as_deref(), Some("HOSPITAL1"));
        assert_eq!(document.discharge_date, Some(discharge.date()));
    }

    #[test]
    fn test_address_parts_are_joined() {
        let address = Address {
            premise: Some("1".to_string()),
            street: Some("High Street".to_string()),
            town: Some("Leeds".to_string()),
            postal_code: Some("LS1 1AA".to_string()),
            primary: true,
            ..Default::default()
        };

        let translated = to_address(&address);
        assert_eq!(translated.full_address, "1, High Street, Leeds, LS1 1AA");
        assert!(translated.primary_address);
    }
}
