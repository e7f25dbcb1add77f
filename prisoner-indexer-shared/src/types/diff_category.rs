//! Named groupings of prisoner document fields.

use serde::{Deserialize, Serialize};

/// A category of related document fields, used to describe which parts of a
/// prisoner record changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffCategory {
    Identifiers,
    PersonalDetails,
    Alerts,
    Status,
    Location,
    Sentence,
    RestrictedPatient,
    IncentiveLevel,
    PhysicalDetails,
    ContactDetails,
}

impl DiffCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffCategory::Identifiers => "IDENTIFIERS",
            DiffCategory::PersonalDetails => "PERSONAL_DETAILS",
            DiffCategory::Alerts => "ALERTS",
            DiffCategory::Status => "STATUS",
            DiffCategory::Location => "LOCATION",
            DiffCategory::Sentence => "SENTENCE",
            DiffCategory::RestrictedPatient => "RESTRICTED_PATIENT",
            DiffCategory::IncentiveLevel => "INCENTIVE_LEVEL",
            DiffCategory::PhysicalDetails => "PHYSICAL_DETAILS",
            DiffCategory::ContactDetails => "CONTACT_DETAILS",
        }
    }
}

impl std::fmt::Display for DiffCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
