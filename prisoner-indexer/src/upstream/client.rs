use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::errors::UpstreamError;
use crate::upstream::{
    IncentiveReviewSummary, OffenderBooking, PrisonApi, PrisonerNumberPage, RestrictedPatient,
};
use prisoner_indexer_shared::{CurrentIncentive, IncentiveLevel};

/// HTTP client for the prison system of record.
///
/// # Example
///
/// ```ignore
/// let client = PrisonApiClient::new("http://prison-api", Duration::from_secs(10))?;
/// let offender = client.get_offender("A1234AA").await?;
/// ```
pub struct PrisonApiClient {
    client: ReqwestClient,
    base_url: String,
}

impl PrisonApiClient {
    /// Create a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "Created prison API client");

        Ok(Self { client, base_url })
    }

    /// GET `path` and decode the JSON body; 404 maps to `None`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling prison API");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, body = %body, "Prison API request failed");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value = response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::decode(format!("{}: {}", url, e)))?;
        Ok(Some(value))
    }
}

#[async_trait]
impl PrisonApi for PrisonApiClient {
    async fn count_prisoners(&self) -> Result<u64, UpstreamError> {
        let page: PrisonerNumberPage = self
            .get_json("/api/prisoners/prisoner-numbers?page=0&size=1")
            .await?
            .unwrap_or_default();
        Ok(page.total_elements)
    }

    async fn prisoner_numbers(&self, page: u64, size: u64) -> Result<Vec<String>, UpstreamError> {
        let path = format!("/api/prisoners/prisoner-numbers?page={}&size={}", page, size);
        let page: PrisonerNumberPage = self.get_json(&path).await?.unwrap_or_default();
        Ok(page.content)
    }

    async fn get_offender(
        &self,
        prisoner_number: &str,
    ) -> Result<Option<OffenderBooking>, UpstreamError> {
        self.get_json(&format!("/api/prisoner-search/offenders/{}", prisoner_number))
            .await
    }

    async fn prisoner_number_for_booking(
        &self,
        booking_id: i64,
    ) -> Result<Option<String>, UpstreamError> {
        let booking: Option<OffenderBooking> = self
            .get_json(&format!("/api/bookings/{}?basicInfo=true", booking_id))
            .await?;
        Ok(booking.map(|booking| booking.offender_no))
    }

    async fn get_incentive_level(
        &self,
        booking_id: i64,
    ) -> Result<Option<CurrentIncentive>, UpstreamError> {
        let summary: Option<IncentiveReviewSummary> = self
            .get_json(&format!("/incentive-reviews/booking/{}?with-details=false", booking_id))
            .await?;

        Ok(summary.map(|summary| CurrentIncentive {
            level: IncentiveLevel {
                code: summary.iep_code,
                description: summary.iep_level,
            },
            date_time: summary.iep_time,
            next_review_date: summary.next_review_date,
        }))
    }

    async fn get_restricted_patient(
        &self,
        prisoner_number: &str,
    ) -> Result<Option<RestrictedPatient>, UpstreamError> {
        self.get_json(&format!(
            "/restricted-patient/prison-number/{}",
            prisoner_number
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = PrisonApiClient::new("http://prison-api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://prison-api");
    }
}
