use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::validation::validate_job_id;
use super::{ApiError, AppState, StatusResponse};
use crate::domain::JobId;

/// `GET /api/status/{job_id}`
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job_id = JobId::new(validate_job_id(&job_id)?);
    let report = state.generation_service().check_status(&job_id).await?;
    Ok(Json(report.into()))
}

/// `GET /api/status/` with an empty id segment.
pub async fn missing_job_id() -> ApiError {
    ApiError::validation("Task ID is required")
}
