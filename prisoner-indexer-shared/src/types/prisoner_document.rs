//! Prisoner document types for the search index.
//!
//! This module defines the document structure that is indexed in the search engine.
//! Documents are built from the system of record by the translation boundary and
//! are otherwise treated as immutable values.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier type recorded upstream when two prisoner records are merged.
pub const MERGED_IDENTIFIER_TYPE: &str = "MERGED";

/// Document representation of a prisoner in the search index.
///
/// The document is keyed by `prisoner_number`. Enrichment fields
/// (`current_incentive` and the restricted patient block) come from separate
/// upstream lookups and may carry the last known value when those lookups fail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PrisonerDocument {
    pub prisoner_number: String,
    pub pnc_number: Option<String>,
    pub cro_number: Option<String>,
    pub booking_id: Option<String>,
    pub book_number: Option<String>,

    pub first_name: String,
    pub middle_names: Option<String>,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub nationality: Option<String>,
    pub religion: Option<String>,
    pub marital_status: Option<String>,
    pub aliases: Vec<PrisonerAlias>,
    pub identifiers: Vec<PrisonerIdentifier>,

    /// Whether the prisoner has an active booking.
    pub active: bool,
    /// Combined booking status, e.g. `ACTIVE IN`, `ACTIVE OUT`, `INACTIVE OUT`.
    pub status: Option<String>,
    /// `IN`, `OUT` or `TRN`.
    pub in_out_status: Option<String>,
    pub last_movement_type_code: Option<String>,
    pub last_movement_reason_code: Option<String>,
    pub last_movement_at: Option<NaiveDateTime>,

    pub prison_id: Option<String>,
    pub prison_name: Option<String>,
    pub cell_location: Option<String>,

    pub legal_status: Option<String>,
    pub imprisonment_status: Option<String>,
    pub convicted_status: Option<String>,
    pub recall: Option<bool>,
    pub indeterminate_sentence: Option<bool>,
    pub most_serious_offence: Option<String>,
    pub sentence_start_date: Option<NaiveDate>,
    pub release_date: Option<NaiveDate>,
    pub confirmed_release_date: Option<NaiveDate>,
    pub conditional_release_date: Option<NaiveDate>,
    pub parole_eligibility_date: Option<NaiveDate>,
    pub home_detention_curfew_eligibility_date: Option<NaiveDate>,
    pub licence_expiry_date: Option<NaiveDate>,
    pub sentence_expiry_date: Option<NaiveDate>,

    pub current_incentive: Option<CurrentIncentive>,

    pub restricted_patient: bool,
    pub supporting_prison_id: Option<String>,
    pub discharged_hospital_id: Option<String>,
    pub discharge_date: Option<NaiveDate>,

    pub alerts: Vec<PrisonerAlert>,

    pub addresses: Vec<PrisonerAddress>,
    pub email_addresses: Vec<String>,
    pub phone_numbers: Vec<PhoneNumber>,

    pub height_centimetres: Option<i32>,
    pub weight_kilograms: Option<i32>,
    pub hair_colour: Option<String>,
    pub eye_colour: Option<String>,
    pub build: Option<String>,
    pub distinguishing_marks: Vec<String>,

    /// Timestamp when the document was built for indexing.
    pub indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PrisonerAlias {
    pub first_name: String,
    pub middle_names: Option<String>,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PrisonerIdentifier {
    /// Identifier type such as `PNC`, `CRO` or `MERGED`.
    pub identifier_type: String,
    pub value: String,
    pub issued_date: Option<NaiveDate>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PrisonerAlert {
    pub alert_type: String,
    pub alert_code: String,
    pub active: bool,
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PrisonerAddress {
    pub full_address: String,
    pub postal_code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub primary_address: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PhoneNumber {
    pub phone_type: String,
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct IncentiveLevel {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CurrentIncentive {
    pub level: IncentiveLevel,
    pub date_time: Option<NaiveDateTime>,
    pub next_review_date: Option<NaiveDate>,
}

impl PrisonerDocument {
    /// Create a minimal document for a prisoner number.
    pub fn new(prisoner_number: impl Into<String>) -> Self {
        Self {
            prisoner_number: prisoner_number.into(),
            ..Default::default()
        }
    }

    /// The document ID used in the search index.
    pub fn document_id(&self) -> &str {
        &self.prisoner_number
    }

    /// Codes of the alerts that are active and not expired.
    pub fn active_alert_codes(&self) -> BTreeSet<String> {
        self.alerts
            .iter()
            .filter(|alert| alert.active && !alert.expired)
            .map(|alert| alert.alert_code.clone())
            .collect()
    }

    /// Most recent time a merge identifier was recorded against this prisoner.
    pub fn last_merged_at(&self) -> Option<NaiveDateTime> {
        self.identifiers
            .iter()
            .filter(|identifier| identifier.identifier_type == MERGED_IDENTIFIER_TYPE)
            .filter_map(|identifier| identifier.created_at)
            .max()
    }

    /// Copy of the document with indexing metadata cleared, used for hashing and
    /// comparisons where only prisoner data matters.
    pub fn without_metadata(&self) -> Self {
        Self {
            indexed_at: None,
            ..self.clone()
        }
    }
}
