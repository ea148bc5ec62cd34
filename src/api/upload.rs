use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::warn;

use super::{ApiError, AppState, UploadResponse};
use crate::services::StorageError;

const FILE_FIELD: &str = "file";

/// `POST /api/upload`
///
/// Stores the multipart `file` part in the image bucket and returns its public URL.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_mb = state.config().uploads.max_bytes / (1024 * 1024);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, max_mb))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or("upload")
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let body = field.bytes().await.map_err(|e| multipart_error(&e, max_mb))?;

        let uploaded = state
            .storage_service()
            .upload_image(&file_name, content_type.as_deref(), body)
            .await?;

        return Ok(Json(UploadResponse {
            success: true,
            url: uploaded.url,
            file_name: uploaded.file_name,
        }));
    }

    Err(ApiError::validation("No file provided"))
}

fn multipart_error(err: &MultipartError, max_mb: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return StorageError::TooLarge(max_mb).into();
    }
    warn!(error = %err, "Malformed multipart upload");
    ApiError::validation(err.body_text())
}
