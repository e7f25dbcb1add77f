//! Mapping of service errors to HTTP responses.
//!
//! Lifecycle guard violations are conflicts (409) and carry the unchanged
//! index status. An unknown prisoner is 404. Everything else is 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::errors::{LifecycleError, SyncError};
use prisoner_indexer_repository::RepositoryError;

#[derive(Debug)]
pub enum ApiError {
    Lifecycle(LifecycleError),
    Sync(SyncError),
    Repository(RepositoryError),
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        Self::Lifecycle(err)
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Lifecycle(inner) => Self::Lifecycle(inner),
            other => Self::Sync(other),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Lifecycle(e) if e.is_conflict() => StatusCode::CONFLICT,
            Self::Sync(SyncError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Lifecycle(e) => json!({
                "status": status.as_u16(),
                "reason": e.to_string(),
                "indexStatus": e.status(),
            }),
            Self::Sync(e) => json!({ "status": status.as_u16(), "reason": e.to_string() }),
            Self::Repository(e) => json!({ "status": status.as_u16(), "reason": e.to_string() }),
        };

        if status.is_server_error() {
            error!(body = %body, "Admin request failed");
        }
        (status, Json(body)).into_response()
    }
}
