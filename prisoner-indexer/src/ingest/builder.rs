//! Fetch-and-build of prisoner documents.
//!
//! Wraps the upstream calls needed for one prisoner around the pure
//! [`build_document`] translation. Shared by the ingestion pipeline and the
//! consistency engine.

use std::sync::Arc;

use tracing::warn;

use crate::errors::UpstreamError;
use crate::retry::RetryPolicy;
use crate::translate::build_document;
use crate::upstream::{OffenderBooking, PrisonApi};
use prisoner_indexer_shared::PrisonerDocument;

#[derive(Clone)]
pub struct DocumentBuilder {
    prison_api: Arc<dyn PrisonApi>,
    retry: RetryPolicy,
}

impl DocumentBuilder {
    pub fn new(prison_api: Arc<dyn PrisonApi>, retry: RetryPolicy) -> Self {
        Self { prison_api, retry }
    }

    pub fn prison_api(&self) -> &Arc<dyn PrisonApi> {
        &self.prison_api
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch and build the document for `prisoner_number`.
    ///
    /// Returns `Ok(None)` when the prisoner does not exist upstream. A failed
    /// offender fetch fails the build; failed enrichment lookups fall back to
    /// `existing`.
    pub async fn fetch_and_build(
        &self,
        prisoner_number: &str,
        existing: Option<&PrisonerDocument>,
    ) -> Result<Option<PrisonerDocument>, UpstreamError> {
        let offender = self
            .retry
            .run("get_offender", || self.prison_api.get_offender(prisoner_number))
            .await?;

        match offender {
            Some(offender) => Ok(Some(self.build(&offender, existing).await)),
            None => Ok(None),
        }
    }

    /// Build the document for an already fetched offender.
    pub async fn build(
        &self,
        offender: &OffenderBooking,
        existing: Option<&PrisonerDocument>,
    ) -> PrisonerDocument {
        let prisoner_number = offender.offender_no.as_str();

        let incentive = match offender.booking_id {
            Some(booking_id) => {
                self.retry
                    .run("get_incentive_level", || {
                        self.prison_api.get_incentive_level(booking_id)
                    })
                    .await
            }
            None => Ok(None),
        };
        if let Err(e) = &incentive {
            warn!(
                prisoner_number = prisoner_number,
                error = %e,
                event = "incentive_lookup_failed",
                "Keeping last known incentive level"
            );
        }

        let restricted_patient = self
            .retry
            .run("get_restricted_patient", || {
                self.prison_api.get_restricted_patient(prisoner_number)
            })
            .await;
        if let Err(e) = &restricted_patient {
            warn!(
                prisoner_number = prisoner_number,
                error = %e,
                event = "restricted_patient_lookup_failed",
                "Keeping last known restricted patient details"
            );
        }

        build_document(offender, incentive, restricted_patient, existing)
    }
}
