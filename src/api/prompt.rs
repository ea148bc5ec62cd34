use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::validation::{JsonBody, validate_length};
use super::{ApiError, AppState, PromptRequest, PromptResponse};

const DESCRIPTION_CHARS: (usize, usize) = (5, 200);
const MAX_DETAILS_CHARS: usize = 300;

/// `POST /api/prompt`
///
/// Turns an image description into an animation prompt. `X-Cache` tells
/// whether the answer came from the prompt cache.
pub async fn enhance_prompt(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<PromptRequest>,
) -> Result<Response, ApiError> {
    let (min, max) = DESCRIPTION_CHARS;
    let description = validate_length("imageDescription", &request.image_description, min, Some(max))?;
    let details = request.animation_details.as_deref().unwrap_or_default();
    validate_length("animationDetails", details, 0, Some(MAX_DETAILS_CHARS))?;

    let enhanced = state.prompt_service().enhance(description, details).await?;

    let max_age = state.config().cache.prompt_max_age_seconds;
    let cache_status = if enhanced.cached { "HIT" } else { "MISS" };

    let mut response = Json(PromptResponse {
        success: true,
        enhanced: enhanced.prompt,
        cached: enhanced.cached,
    })
    .into_response();

    let headers = response.headers_mut();
    headers.insert("x-cache", HeaderValue::from_static(cache_status));
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={max_age}")) {
        headers.insert(header::CACHE_CONTROL, value);
    }

    Ok(response)
}
