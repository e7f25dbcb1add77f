//! Response shapes returned by the prison system of record.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Full detail of a prisoner and their latest booking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffenderBooking {
    pub offender_no: String,
    pub booking_id: Option<i64>,
    pub booking_no: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub active_flag: bool,
    pub agency_id: Option<String>,
    pub agency_description: Option<String>,
    pub assigned_living_unit: Option<AssignedLivingUnit>,
    /// `IN`, `OUT` or `TRN`.
    pub in_out_status: Option<String>,
    pub last_movement_type_code: Option<String>,
    pub last_movement_reason_code: Option<String>,
    pub last_movement_time: Option<NaiveDateTime>,
    pub legal_status: Option<String>,
    pub imprisonment_status: Option<String>,
    pub convicted_status: Option<String>,
    pub recall: Option<bool>,
    pub indeterminate_sentence: Option<bool>,
    pub physical_attributes: Option<PhysicalAttributes>,
    pub physical_characteristics: Vec<PhysicalCharacteristic>,
    pub physical_marks: Vec<PhysicalMark>,
    pub profile_information: Vec<ProfileInformation>,
    pub identifiers: Vec<OffenderIdentifier>,
    pub aliases: Vec<Alias>,
    pub alerts: Vec<Alert>,
    pub sentence_detail: Option<SentenceDetail>,
    pub offence_history: Vec<OffenceHistory>,
    pub addresses: Vec<Address>,
    pub email_addresses: Vec<Email>,
    pub phones: Vec<Telephone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignedLivingUnit {
    pub agency_id: Option<String>,
    pub agency_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalAttributes {
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub height_centimetres: Option<i32>,
    pub weight_kilograms: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalCharacteristic {
    #[serde(rename = "type")]
    pub characteristic_type: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalMark {
    #[serde(rename = "type")]
    pub mark_type: String,
    pub body_part: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileInformation {
    #[serde(rename = "type")]
    pub profile_type: String,
    pub result_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffenderIdentifier {
    #[serde(rename = "type")]
    pub identifier_type: String,
    pub value: String,
    pub issued_date: Option<NaiveDate>,
    pub when_created: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Alias {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    pub alert_type: String,
    pub alert_code: String,
    pub active: bool,
    pub expired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentenceDetail {
    pub sentence_start_date: Option<NaiveDate>,
    pub release_date: Option<NaiveDate>,
    pub confirmed_release_date: Option<NaiveDate>,
    pub conditional_release_date: Option<NaiveDate>,
    pub parole_eligibility_date: Option<NaiveDate>,
    pub home_detention_curfew_eligibility_date: Option<NaiveDate>,
    pub licence_expiry_date: Option<NaiveDate>,
    pub sentence_expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffenceHistory {
    pub offence_description: String,
    pub most_serious: bool,
    pub offence_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub flat: Option<String>,
    pub premise: Option<String>,
    pub street: Option<String>,
    pub town: Option<String>,
    pub postal_code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Email {
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Telephone {
    #[serde(rename = "type")]
    pub phone_type: String,
    pub number: String,
}

/// Restricted patient record: a prisoner released to a secure hospital but
/// still supported by a prison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestrictedPatient {
    pub supporting_prison_id: Option<String>,
    pub hospital_location_code: Option<String>,
    pub discharge_time: Option<NaiveDateTime>,
}

/// Current incentive level review as returned by the incentives API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveReviewSummary {
    pub iep_code: String,
    pub iep_level: String,
    pub iep_time: Option<NaiveDateTime>,
    pub next_review_date: Option<NaiveDate>,
}

/// One page of prisoner numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrisonerNumberPage {
    pub content: Vec<String>,
    pub total_elements: u64,
}
