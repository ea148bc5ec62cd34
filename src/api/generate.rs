use axum::{Json, extract::State};
use std::sync::Arc;

use super::validation::{JsonBody, validate_http_url, validate_length};
use super::{ApiError, AppState, GenerateRequest, GenerateResponse};
use crate::domain::{GenerationParameters, VIDEO_MODEL};
use crate::services::GenerationRequest;

const MIN_PROMPT_CHARS: usize = 10;

/// `POST /api/generate`
///
/// Starts an image-to-video job. With the async strategy the response carries
/// the job id to poll; with the sync strategy it already carries `videoUrl`.
pub async fn generate_video(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    validate_http_url("imageUrl", &request.image_url)?;
    validate_length("prompt", &request.prompt, MIN_PROMPT_CHARS, None)?;

    let parameters = GenerationParameters {
        duration: request.duration.unwrap_or_default(),
        resolution: request.resolution.unwrap_or_default(),
        prompt_optimizer: request.prompt_optimizer.unwrap_or(false),
    };

    let outcome = state
        .generation_service()
        .submit(GenerationRequest {
            image_url: request.image_url,
            prompt: request.prompt,
            parameters,
        })
        .await?;

    Ok(Json(GenerateResponse {
        success: true,
        prediction_id: outcome.handle.job_id.to_string(),
        status: outcome.handle.status,
        model: VIDEO_MODEL,
        duration: parameters.duration,
        resolution: parameters.resolution,
        video_url: outcome.video_url,
        warning: outcome.warning,
    }))
}
