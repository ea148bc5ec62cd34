//! Saved generations.
//!
//! Records are written by the generation service when a job finishes, and by
//! clients that create or import them directly.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tracing::info;

use super::validation::{JsonBody, normalize_timestamp, validate_http_url, validate_length};
use super::{
    ApiError, AppState, GenerationDto, GenerationInput, GenerationListResponse,
    GenerationResponse, ImportRequest, ImportResponse, SuccessResponse,
};
use crate::db::NewGeneration;
use crate::domain::events::NotificationEvent;

const NOTHING_IMPORTED: &str = "No new generations to import";

/// `GET /api/generations`
///
/// Newest first.
pub async fn list_generations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GenerationListResponse>, ApiError> {
    let generations = state
        .store()
        .list_generations()
        .await
        .map_err(ApiError::database)?;

    Ok(Json(GenerationListResponse {
        generations: generations.into_iter().map(GenerationDto::from).collect(),
    }))
}

/// `POST /api/generations`
pub async fn create_generation(
    State(state): State<Arc<AppState>>,
    JsonBody(input): JsonBody<GenerationInput>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let record = to_new_generation(input)?;

    let saved = state
        .store()
        .add_generation(record)
        .await
        .map_err(ApiError::database)?;

    info!(id = %saved.id, "Generation saved");
    let _ = state
        .event_bus()
        .send(NotificationEvent::GenerationSaved { id: saved.id.clone() });

    Ok(Json(GenerationResponse {
        generation: saved.into(),
    }))
}

/// `DELETE /api/generations`
pub async fn clear_generations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let removed = state
        .store()
        .clear_generations()
        .await
        .map_err(ApiError::database)?;

    info!(removed, "Generations cleared");
    let _ = state.event_bus().send(NotificationEvent::GenerationsCleared);

    Ok(Json(SuccessResponse::OK))
}

/// `DELETE /api/generations/{id}`
pub async fn delete_generation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let deleted = state
        .store()
        .delete_generation(&id)
        .await
        .map_err(ApiError::database)?;

    if !deleted {
        return Err(ApiError::not_found("Generation", &id));
    }

    info!(id = %id, "Generation deleted");
    let _ = state
        .event_bus()
        .send(NotificationEvent::GenerationDeleted { id });

    Ok(Json(SuccessResponse::OK))
}

/// `POST /api/generations/import`
///
/// Records whose id already exists are skipped, so importing the same export
/// twice is harmless.
pub async fn import_generations(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    let records = request
        .generations
        .into_iter()
        .map(to_new_generation)
        .collect::<Result<Vec<_>, _>>()?;

    let imported = state
        .store()
        .import_generations(records)
        .await
        .map_err(ApiError::database)?;

    info!(imported, "Generations imported");

    Ok(Json(ImportResponse {
        imported,
        message: (imported == 0).then(|| NOTHING_IMPORTED.to_string()),
    }))
}

fn to_new_generation(input: GenerationInput) -> Result<NewGeneration, ApiError> {
    validate_http_url("imageUrl", &input.image_url)?;
    validate_http_url("videoUrl", &input.video_url)?;
    validate_length("prompt", &input.prompt, 1, None)?;

    let created_at = input
        .created_at
        .as_deref()
        .map(|value| normalize_timestamp("createdAt", value))
        .transpose()?;

    Ok(NewGeneration {
        id: input.id.filter(|id| !id.trim().is_empty()),
        prediction_id: None,
        image_url: input.image_url,
        video_url: input.video_url,
        prompt: input.prompt,
        model: input.model,
        duration: input.duration,
        resolution: input.resolution,
        created_at,
    })
}
