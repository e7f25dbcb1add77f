//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the prisoner search
//! indices and the naming of the two physical indices behind the public alias.

use prisoner_indexer_shared::SyncIndex;
use serde_json::{json, Value};

/// The default public alias name.
pub const DEFAULT_ALIAS: &str = "prisoner-search";

/// Configuration for the search indices.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The public alias name; reads always go through it.
    pub alias: String,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `alias` - The index alias name
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
        }
    }

    /// Physical index name for `index`, e.g. `prisoner-search-a`.
    pub fn index_name(&self, index: SyncIndex) -> Option<String> {
        index.index_name(&self.alias)
    }

    /// Map a physical index name back to its `SyncIndex`.
    pub fn index_for_name(&self, name: &str) -> Option<SyncIndex> {
        [SyncIndex::A, SyncIndex::B]
            .into_iter()
            .find(|index| self.index_name(*index).as_deref() == Some(name))
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ALIAS)
    }
}

fn keyword() -> Value {
    json!({ "type": "keyword" })
}

fn date() -> Value {
    json!({ "type": "date" })
}

fn name_field() -> Value {
    json!({
        "type": "text",
        "fields": {
            "keyword": { "type": "keyword", "ignore_above": 256 }
        }
    })
}

/// Get the index settings and mappings for a prisoner search index.
///
/// Identifiers, codes and statuses are keyword fields for exact filtering;
/// names are analysed text with a keyword sub-field for sorting; nested lists
/// (alerts, aliases, identifiers) are `nested` so their fields stay correlated.
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "prisoner_number": keyword(),
                "pnc_number": keyword(),
                "cro_number": keyword(),
                "booking_id": keyword(),
                "book_number": keyword(),
                "first_name": name_field(),
                "middle_names": name_field(),
                "last_name": name_field(),
                "date_of_birth": date(),
                "gender": keyword(),
                "ethnicity": keyword(),
                "nationality": keyword(),
                "religion": keyword(),
                "marital_status": keyword(),
                "active": { "type": "boolean" },
                "status": keyword(),
                "in_out_status": keyword(),
                "last_movement_type_code": keyword(),
                "last_movement_reason_code": keyword(),
                "last_movement_at": date(),
                "prison_id": keyword(),
                "prison_name": keyword(),
                "cell_location": keyword(),
                "legal_status": keyword(),
                "imprisonment_status": keyword(),
                "convicted_status": keyword(),
                "recall": { "type": "boolean" },
                "indeterminate_sentence": { "type": "boolean" },
                "most_serious_offence": { "type": "text" },
                "sentence_start_date": date(),
                "release_date": date(),
                "confirmed_release_date": date(),
                "conditional_release_date": date(),
                "parole_eligibility_date": date(),
                "home_detention_curfew_eligibility_date": date(),
                "licence_expiry_date": date(),
                "sentence_expiry_date": date(),
                "restricted_patient": { "type": "boolean" },
                "supporting_prison_id": keyword(),
                "discharged_hospital_id": keyword(),
                "discharge_date": date(),
                "current_incentive": {
                    "properties": {
                        "level": {
                            "properties": {
                                "code": keyword(),
                                "description": keyword()
                            }
                        },
                        "date_time": date(),
                        "next_review_date": date()
                    }
                },
                "aliases": {
                    "type": "nested",
                    "properties": {
                        "first_name": name_field(),
                        "middle_names": name_field(),
                        "last_name": name_field(),
                        "date_of_birth": date(),
                        "gender": keyword()
                    }
                },
                "identifiers": {
                    "type": "nested",
                    "properties": {
                        "identifier_type": keyword(),
                        "value": keyword(),
                        "issued_date": date(),
                        "created_at": date()
                    }
                },
                "alerts": {
                    "type": "nested",
                    "properties": {
                        "alert_type": keyword(),
                        "alert_code": keyword(),
                        "active": { "type": "boolean" },
                        "expired": { "type": "boolean" }
                    }
                },
                "addresses": {
                    "type": "nested",
                    "properties": {
                        "full_address": { "type": "text" },
                        "postal_code": keyword(),
                        "start_date": date(),
                        "primary_address": { "type": "boolean" }
                    }
                },
                "email_addresses": keyword(),
                "phone_numbers": {
                    "type": "nested",
                    "properties": {
                        "phone_type": keyword(),
                        "number": keyword()
                    }
                },
                "height_centimetres": { "type": "integer" },
                "weight_kilograms": { "type": "integer" },
                "hair_colour": keyword(),
                "eye_colour": keyword(),
                "build": keyword(),
                "distinguishing_marks": keyword(),
                "indexed_at": date()
            }
        }
    })
}
