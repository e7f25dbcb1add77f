//! JSON envelope for published domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use prisoner_indexer_shared::PrisonerEvent;

/// Identifier type used for prisoner numbers in person references.
pub const NOMS_IDENTIFIER: &str = "NOMS";

/// The envelope every domain event is published in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEventEnvelope {
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub version: u32,
    pub description: String,
    pub additional_information: Value,
    pub person_reference: PersonReference,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonReference {
    pub identifiers: Vec<PersonIdentifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonIdentifier {
    #[serde(rename = "type")]
    pub identifier_type: String,
    pub value: String,
}

impl PersonReference {
    pub fn noms(prisoner_number: &str) -> Self {
        Self {
            identifiers: vec![PersonIdentifier {
                identifier_type: NOMS_IDENTIFIER.to_string(),
                value: prisoner_number.to_string(),
            }],
        }
    }

    /// The prisoner number, if the reference carries one.
    pub fn noms_number(&self) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|identifier| identifier.identifier_type == NOMS_IDENTIFIER)
            .map(|identifier| identifier.value.as_str())
    }
}

impl DomainEventEnvelope {
    pub fn from_event(event: &PrisonerEvent, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_type: event.event_type().to_string(),
            occurred_at,
            version: 1,
            description: event.description().to_string(),
            additional_information: additional_information(event),
            person_reference: PersonReference::noms(event.prisoner_number()),
        }
    }
}

fn additional_information(event: &PrisonerEvent) -> Value {
    match event {
        PrisonerEvent::Created { prisoner_number } | PrisonerEvent::Removed { prisoner_number } => {
            json!({ "nomsNumber": prisoner_number })
        }
        PrisonerEvent::Updated {
            prisoner_number,
            categories_changed,
        } => json!({
            "nomsNumber": prisoner_number,
            "categoriesChanged": categories_changed,
        }),
        PrisonerEvent::Received {
            prisoner_number,
            prison_id,
            reason,
        } => json!({
            "nomsNumber": prisoner_number,
            "prisonId": prison_id,
            "reason": reason.as_str(),
        }),
        PrisonerEvent::Released {
            prisoner_number,
            prison_id,
            reason,
        } => json!({
            "nomsNumber": prisoner_number,
            "prisonId": prison_id,
            "reason": reason.as_str(),
        }),
        PrisonerEvent::AlertsUpdated {
            prisoner_number,
            booking_id,
            alerts_added,
            alerts_removed,
        } => json!({
            "nomsNumber": prisoner_number,
            "bookingId": booking_id,
            "alertsAdded": alerts_added,
            "alertsRemoved": alerts_removed,
        }),
        PrisonerEvent::ConvictedStatusChanged {
            prisoner_number,
            convicted_status,
        } => json!({
            "nomsNumber": prisoner_number,
            "convictedStatus": convicted_status,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prisoner_indexer_shared::{DiffCategory, ReceiveReason};

    #[test]
    fn test_received_envelope() {
        let event = PrisonerEvent::Received {
            prisoner_number: "A1234AA".to_string(),
            prison_id: "MDI".to_string(),
            reason: ReceiveReason::Transferred,
        };

        let envelope = DomainEventEnvelope::from_event(&event, Utc::now());
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["eventType"], "prisoner-search.prisoner.received");
        assert_eq!(json["version"], 1);
        assert_eq!(json["additionalInformation"]["reason"], "TRANSFERRED");
        assert_eq!(json["additionalInformation"]["prisonId"], "MDI");
        assert_eq!(json["personReference"]["identifiers"][0]["type"], "NOMS");
        assert_eq!(json["personReference"]["identifiers"][0]["value"], "A1234AA");
    }

    #[test]
    fn test_updated_envelope_lists_categories() {
        let event = PrisonerEvent::Updated {
            prisoner_number: "A1234AA".to_string(),
            categories_changed: vec![DiffCategory::Location, DiffCategory::Sentence],
        };

        let json = serde_json::to_value(DomainEventEnvelope::from_event(&event, Utc::now())).unwrap();
        assert_eq!(
            json["additionalInformation"]["categoriesChanged"],
            json!(["LOCATION", "SENTENCE"])
        );
    }

    #[test]
    fn test_noms_number_lookup() {
        let reference = PersonReference {
            identifiers: vec![
                PersonIdentifier {
                    identifier_type: "CRN".to_string(),
                    value: "X12345".to_string(),
                },
                PersonIdentifier {
                    identifier_type: "NOMS".to_string(),
                    value: "A1234AA".to_string(),
                },
            ],
        };

        assert_eq!(reference.noms_number(), Some("A1234AA"));
        assert_eq!(PersonReference::default().noms_number(), None);
    }
}
