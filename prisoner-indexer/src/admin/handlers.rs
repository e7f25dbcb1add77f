// HTTP request handlers
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::admin::{error::ApiError, state::AdminState};
use crate::errors::SyncError;
use crate::retention::purge_stale_hashes;
use crate::sync::SyncOutcome;
use prisoner_indexer_shared::{IndexStatus, PrisonerDocument};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkCompleteParams {
    pub ignore_threshold: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SwitchParams {
    pub force: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurgeParams {
    pub older_than_days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub index_status: IndexStatus,
    pub pages_enqueued: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub pages_enqueued: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub older_than_days: u32,
    pub deleted: u64,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Prisoner indexer is running")
}

pub async fn index_status(State(state): State<AdminState>) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(state.lifecycle.status().await?))
}

/// Start a rebuild of the other index and enqueue its population.
pub async fn build(State(state): State<AdminState>) -> Result<Json<BuildResponse>, ApiError> {
    let (index_status, pages_enqueued) = state.pipeline.rebuild().await?;
    info!(pages = pages_enqueued, "Rebuild requested");
    Ok(Json(BuildResponse {
        index_status,
        pages_enqueued,
    }))
}

pub async fn mark_complete(
    State(state): State<AdminState>,
    Query(params): Query<MarkCompleteParams>,
) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(state.lifecycle.mark_complete(params.ignore_threshold).await?))
}

pub async fn cancel(State(state): State<AdminState>) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(state.lifecycle.cancel().await?))
}

pub async fn switch(
    State(state): State<AdminState>,
    Query(params): Query<SwitchParams>,
) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(state.lifecycle.switch_index(params.force).await?))
}

/// Index one prisoner into every active index without publishing events.
pub async fn index_prisoner(
    State(state): State<AdminState>,
    Path(prisoner_number): Path<String>,
) -> Result<Json<PrisonerDocument>, ApiError> {
    Ok(Json(state.pipeline.populate_one(&prisoner_number).await?))
}

pub async fn refresh(State(state): State<AdminState>) -> Result<Json<RefreshResponse>, ApiError> {
    let pages_enqueued = state.pipeline.refresh_full().await?;
    Ok(Json(RefreshResponse { pages_enqueued }))
}

pub async fn refresh_prisoner(
    State(state): State<AdminState>,
    Path(prisoner_number): Path<String>,
) -> Result<Json<SyncOutcome>, ApiError> {
    match state.pipeline.refresh_one(&prisoner_number).await? {
        SyncOutcome::NotFound => Err(SyncError::NotFound(prisoner_number).into()),
        outcome => Ok(Json(outcome)),
    }
}

pub async fn purge_hashes(
    State(state): State<AdminState>,
    Query(params): Query<PurgeParams>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let older_than_days = params.older_than_days.unwrap_or(state.hash_retention_days);
    let deleted = purge_stale_hashes(state.hashes.as_ref(), older_than_days).await?;
    Ok(Json(PurgeResponse {
        older_than_days,
        deleted,
    }))
}
