//! Prison system of record client.
//!
//! This module provides:
//! - [`PrisonApi`] trait abstracting the upstream calls the indexer makes
//! - [`PrisonApiClient`] production client over HTTP
//! - [`MockPrisonApi`] in-memory population for tests and local runs

mod client;
mod mock;
mod types;

pub use client::PrisonApiClient;
pub use mock::MockPrisonApi;
pub use types::{
    Address, Alert, Alias, AssignedLivingUnit, Email, IncentiveReviewSummary, OffenceHistory,
    OffenderBooking, OffenderIdentifier, PhysicalAttributes, PhysicalCharacteristic, PhysicalMark,
    PrisonerNumberPage, ProfileInformation, RestrictedPatient, SentenceDetail, Telephone,
};

use async_trait::async_trait;

use crate::errors::UpstreamError;
use prisoner_indexer_shared::CurrentIncentive;

/// Upstream calls used to build prisoner documents.
///
/// Lookups of a single resource return `Ok(None)` when the resource does not
/// exist, so callers can tell "missing" apart from "failed".
#[async_trait]
pub trait PrisonApi: Send + Sync {
    /// Total number of prisoners known upstream.
    async fn count_prisoners(&self) -> Result<u64, UpstreamError>;

    /// One page of prisoner numbers, ordered, zero-based.
    async fn prisoner_numbers(&self, page: u64, size: u64) -> Result<Vec<String>, UpstreamError>;

    /// Full detail of a prisoner's latest booking.
    async fn get_offender(
        &self,
        prisoner_number: &str,
    ) -> Result<Option<OffenderBooking>, UpstreamError>;

    /// Resolve a booking id to the prisoner it belongs to.
    async fn prisoner_number_for_booking(
        &self,
        booking_id: i64,
    ) -> Result<Option<String>, UpstreamError>;

    /// Current incentive level for a booking.
    async fn get_incentive_level(
        &self,
        booking_id: i64,
    ) -> Result<Option<CurrentIncentive>, UpstreamError>;

    /// Restricted patient record, if the prisoner is one.
    async fn get_restricted_patient(
        &self,
        prisoner_number: &str,
    ) -> Result<Option<RestrictedPatient>, UpstreamError>;
}
