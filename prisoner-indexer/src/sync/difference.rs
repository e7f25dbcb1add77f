//! Field-level differences between two prisoner documents.
//!
//! Fields are assigned to categories by the static [`FIELD_CATEGORIES`]
//! registry. Comparison works on the serialized form of each registered field.

use serde_json::Value;

use prisoner_indexer_shared::{DiffCategory, PrisonerDocument};

/// Every diffable document field and the category it belongs to.
pub const FIELD_CATEGORIES: &[(&str, DiffCategory)] = &[
    ("prisoner_number", DiffCategory::Identifiers),
    ("pnc_number", DiffCategory::Identifiers),
    ("cro_number", DiffCategory::Identifiers),
    ("booking_id", DiffCategory::Identifiers),
    ("book_number", DiffCategory::Identifiers),
    ("identifiers", DiffCategory::Identifiers),
    ("first_name", DiffCategory::PersonalDetails),
    ("middle_names", DiffCategory::PersonalDetails),
    ("last_name", DiffCategory::PersonalDetails),
    ("date_of_birth", DiffCategory::PersonalDetails),
    ("gender", DiffCategory::PersonalDetails),
    ("ethnicity", DiffCategory::PersonalDetails),
    ("nationality", DiffCategory::PersonalDetails),
    ("religion", DiffCategory::PersonalDetails),
    ("marital_status", DiffCategory::PersonalDetails),
    ("aliases", DiffCategory::PersonalDetails),
    ("alerts", DiffCategory::Alerts),
    ("active", DiffCategory::Status),
    ("status", DiffCategory::Status),
    ("in_out_status", DiffCategory::Status),
    ("last_movement_type_code", DiffCategory::Status),
    ("last_movement_reason_code", DiffCategory::Status),
    ("last_movement_at", DiffCategory::Status),
    ("legal_status", DiffCategory::Status),
    ("imprisonment_status", DiffCategory::Status),
    ("convicted_status", DiffCategory::Status),
    ("recall", DiffCategory::Status),
    ("indeterminate_sentence", DiffCategory::Status),
    ("prison_id", DiffCategory::Location),
    ("prison_name", DiffCategory::Location),
    ("cell_location", DiffCategory::Location),
    ("most_serious_offence", DiffCategory::Sentence),
    ("sentence_start_date", DiffCategory::Sentence),
    ("release_date", DiffCategory::Sentence),
    ("confirmed_release_date", DiffCategory::Sentence),
    ("conditional_release_date", DiffCategory::Sentence),
    ("parole_eligibility_date", DiffCategory::Sentence),
    ("home_detention_curfew_eligibility_date", DiffCategory::Sentence),
    ("licence_expiry_date", DiffCategory::Sentence),
    ("sentence_expiry_date", DiffCategory::Sentence),
    ("restricted_patient", DiffCategory::RestrictedPatient),
    ("supporting_prison_id", DiffCategory::RestrictedPatient),
    ("discharged_hospital_id", DiffCategory::RestrictedPatient),
    ("discharge_date", DiffCategory::RestrictedPatient),
    ("current_incentive", DiffCategory::IncentiveLevel),
    ("height_centimetres", DiffCategory::PhysicalDetails),
    ("weight_kilograms", DiffCategory::PhysicalDetails),
    ("hair_colour", DiffCategory::PhysicalDetails),
    ("eye_colour", DiffCategory::PhysicalDetails),
    ("build", DiffCategory::PhysicalDetails),
    ("distinguishing_marks", DiffCategory::PhysicalDetails),
    ("addresses", DiffCategory::ContactDetails),
    ("email_addresses", DiffCategory::ContactDetails),
    ("phone_numbers", DiffCategory::ContactDetails),
];

/// Indexing metadata that never counts as a difference.
pub const IGNORED_FIELDS: &[&str] = &["indexed_at"];

/// One changed field.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub property: &'static str,
    pub category: DiffCategory,
    pub old_value: Value,
    pub new_value: Value,
}

/// Compare two documents field by field.
///
/// A missing `old` document compares every field against `null`, so only
/// fields with a value show up as differences.
pub fn get_differences(old: Option<&PrisonerDocument>, new: &PrisonerDocument) -> Vec<Difference> {
    let old_value = old.map(to_value).unwrap_or(Value::Null);
    let new_value = to_value(new);

    FIELD_CATEGORIES
        .iter()
        .filter_map(|(property, category)| {
            let before = old_value.get(*property).cloned().unwrap_or(Value::Null);
            let after = new_value.get(*property).cloned().unwrap_or(Value::Null);
            (before != after).then(|| Difference {
                property,
                category: *category,
                old_value: before,
                new_value: after,
            })
        })
        .collect()
}

/// Sorted, distinct categories touched by `differences`.
pub fn changed_categories(differences: &[Difference]) -> Vec<DiffCategory> {
    let mut categories: Vec<DiffCategory> = differences.iter().map(|d| d.category).collect();
    categories.sort();
    categories.dedup();
    categories
}

fn to_value(document: &PrisonerDocument) -> Value {
    serde_json::to_value(document).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use prisoner_indexer_shared::{CurrentIncentive, IncentiveLevel, PrisonerAlert};
    use std::collections::HashSet;

    fn document() -> PrisonerDocument {
        let mut document = PrisonerDocument::new("A1234AA");
        document.first_name = "JOHN".to_string();
        document.last_name = "SMITH".to_string();
        document.prison_id = Some("MDI".to_string());
        document
    }

    #[test]
    fn test_every_document_field_is_registered() {
        let serialized = serde_json::to_value(PrisonerDocument::default()).unwrap();
        let registered: HashSet<&str> = FIELD_CATEGORIES
            .iter()
            .map(|(name, _)| *name)
            .chain(IGNORED_FIELDS.iter().copied())
            .collect();

        for field in serialized.as_object().unwrap().keys() {
            assert!(registered.contains(field.as_str()), "unregistered field {}", field);
        }
        assert_eq!(
            registered.len(),
            serialized.as_object().unwrap().len(),
            "registry names a field the document does not have"
        );
    }

    #[test]
    fn test_identical_documents_have_no_differences() {
        assert!(get_differences(Some(&document()), &document()).is_empty());
    }

    #[test]
    fn test_indexed_at_is_ignored() {
        let mut newer = document();
        newer.indexed_at = Some(Utc::now());

        assert!(get_differences(Some(&document()), &newer).is_empty());
    }

    #[test]
    fn test_differences_are_categorised() {
        let mut newer = document();
        newer.prison_id = Some("LEI".to_string());
        newer.cell_location = Some("LEI-A-1-001".to_string());
        newer.current_incentive = Some(CurrentIncentive {
            level: IncentiveLevel {
                code: "ENH".to_string(),
                description: "Enhanced".to_string(),
            },
            ..Default::default()
        });
        newer.alerts.push(PrisonerAlert {
            alert_type: "X".to_string(),
            alert_code: "XA".to_string(),
            active: true,
            expired: false,
        });

        let differences = get_differences(Some(&document()), &newer);
        let prison = differences
            .iter()
            .find(|d| d.property == "prison_id")
            .unwrap();
        assert_eq!(prison.old_value, Value::String("MDI".to_string()));
        assert_eq!(prison.new_value, Value::String("LEI".to_string()));

        assert_eq!(
            changed_categories(&differences),
            vec![
                DiffCategory::Alerts,
                DiffCategory::Location,
                DiffCategory::IncentiveLevel
            ]
        );
    }

    #[test]
    fn test_new_document_differs_on_populated_fields() {
        let differences = get_differences(None, &document());
        let properties: Vec<&str> = differences.iter().map(|d| d.property).collect();

        assert!(properties.contains(&"prisoner_number"));
        assert!(properties.contains(&"prison_id"));
    }
}
