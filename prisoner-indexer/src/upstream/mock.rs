//! Mock prison API for testing and local development.
//!
//! The `MockPrisonApi` holds an in-memory population of offender bookings and
//! enrichment records, allowing tests to run without network access.
//!
//! # Example
//!
//! ```ignore
//! let api = MockPrisonApi::new();
//! api.add_offender(booking);
//! api.fail_incentives(true);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::UpstreamError;
use crate::upstream::{OffenderBooking, PrisonApi, RestrictedPatient};
use prisoner_indexer_shared::CurrentIncentive;

/// Mock prison API backed by in-memory maps.
#[derive(Default)]
pub struct MockPrisonApi {
    offenders: RwLock<BTreeMap<String, OffenderBooking>>,
    incentives: RwLock<HashMap<i64, CurrentIncentive>>,
    restricted_patients: RwLock<HashMap<String, RestrictedPatient>>,
    /// Prisoner numbers listed by the paging calls but missing on detail fetch.
    listed_only: RwLock<Vec<String>>,
    incentives_failing: AtomicBool,
    restricted_patients_failing: AtomicBool,
    offender_failures: AtomicUsize,
    offender_calls: AtomicUsize,
    count_failures: AtomicUsize,
}

impl MockPrisonApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an offender.
    pub fn add_offender(&self, offender: OffenderBooking) {
        self.offenders
            .write()
            .unwrap()
            .insert(offender.offender_no.clone(), offender);
    }

    /// Remove an offender, as if deleted upstream.
    pub fn remove_offender(&self, prisoner_number: &str) {
        self.offenders.write().unwrap().remove(prisoner_number);
    }

    /// List a prisoner number in pages without providing its detail.
    pub fn add_listed_only(&self, prisoner_number: &str) {
        self.listed_only
            .write()
            .unwrap()
            .push(prisoner_number.to_string());
    }

    pub fn set_incentive(&self, booking_id: i64, incentive: CurrentIncentive) {
        self.incentives.write().unwrap().insert(booking_id, incentive);
    }

    pub fn set_restricted_patient(&self, prisoner_number: &str, patient: RestrictedPatient) {
        self.restricted_patients
            .write()
            .unwrap()
            .insert(prisoner_number.to_string(), patient);
    }

    /// Make incentive lookups fail with a server error.
    pub fn fail_incentives(&self, failing: bool) {
        self.incentives_failing.store(failing, Ordering::SeqCst);
    }

    /// Make restricted patient lookups fail with a server error.
    pub fn fail_restricted_patients(&self, failing: bool) {
        self.restricted_patients_failing
            .store(failing, Ordering::SeqCst);
    }

    /// Fail the next `count` offender detail fetches with a transient error.
    pub fn fail_next_offender_fetches(&self, count: usize) {
        self.offender_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` population counts with a transient error.
    pub fn fail_next_counts(&self, count: usize) {
        self.count_failures.store(count, Ordering::SeqCst);
    }

    /// Number of offender detail fetches made so far.
    pub fn offender_calls(&self) -> usize {
        self.offender_calls.load(Ordering::SeqCst)
    }

    fn all_numbers(&self) -> Vec<String> {
        let mut numbers: Vec<String> = self.offenders.read().unwrap().keys().cloned().collect();
        numbers.extend(self.listed_only.read().unwrap().iter().cloned());
        numbers.sort();
        numbers
    }

    fn server_error() -> UpstreamError {
        UpstreamError::Status {
            status: 503,
            body: "mock failure".to_string(),
        }
    }
}

#[async_trait]
impl PrisonApi for MockPrisonApi {
    async fn count_prisoners(&self) -> Result<u64, UpstreamError> {
        let failing = self
            .count_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Self::server_error());
        }
        Ok(self.all_numbers().len() as u64)
    }

    async fn prisoner_numbers(&self, page: u64, size: u64) -> Result<Vec<String>, UpstreamError> {
        Ok(self
            .all_numbers()
            .into_iter()
            .skip((page * size) as usize)
            .take(size as usize)
            .collect())
    }

    async fn get_offender(
        &self,
        prisoner_number: &str,
    ) -> Result<Option<OffenderBooking>, UpstreamError> {
        self.offender_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .offender_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Self::server_error());
        }
        Ok(self.offenders.read().unwrap().get(prisoner_number).cloned())
    }

    async fn prisoner_number_for_booking(
        &self,
        booking_id: i64,
    ) -> Result<Option<String>, UpstreamError> {
        Ok(self
            .offenders
            .read()
            .unwrap()
            .values()
            .find(|offender| offender.booking_id == Some(booking_id))
            .map(|offender| offender.offender_no.clone()))
    }

    async fn get_incentive_level(
        &self,
        booking_id: i64,
    ) -> Result<Option<CurrentIncentive>, UpstreamError> {
        if self.incentives_failing.load(Ordering::SeqCst) {
            return Err(Self::server_error());
        }
        Ok(self.incentives.read().unwrap().get(&booking_id).cloned())
    }

    async fn get_restricted_patient(
        &self,
        prisoner_number: &str,
    ) -> Result<Option<RestrictedPatient>, UpstreamError> {
        if self.restricted_patients_failing.load(Ordering::SeqCst) {
            return Err(Self::server_error());
        }
        Ok(self
            .restricted_patients
            .read()
            .unwrap()
            .get(prisoner_number)
            .cloned())
    }
}
