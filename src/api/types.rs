use serde::{Deserialize, Serialize};

use crate::db::Generation;
use crate::domain::{JobStatus, VideoDuration, VideoResolution};
use crate::services::{ReportStatus, StatusReport};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: Self = Self { success: true };
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub image_url: String,
    pub prompt: String,
    #[serde(default)]
    pub duration: Option<VideoDuration>,
    #[serde(default)]
    pub resolution: Option<VideoResolution>,
    #[serde(default)]
    pub prompt_optimizer: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub prediction_id: String,
    pub status: JobStatus,
    pub model: &'static str,
    pub duration: VideoDuration,
    pub resolution: VideoResolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub prediction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<StatusReport> for StatusResponse {
    fn from(report: StatusReport) -> Self {
        Self {
            status: report.status,
            video_url: report.video_url,
            prediction_id: report.job_id.to_string(),
            error: report.error,
            warning: report.warning,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub image_description: String,
    #[serde(default)]
    pub animation_details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub success: bool,
    pub enhanced: String,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub file_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationDto {
    pub id: String,
    pub image_url: String,
    pub video_url: String,
    pub prompt: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl From<Generation> for GenerationDto {
    fn from(model: Generation) -> Self {
        Self {
            id: model.id,
            image_url: model.image_url,
            video_url: model.video_url,
            prompt: model.prompt,
            created_at: model.created_at,
            model: model.model,
            duration: model.duration,
            resolution: model.resolution,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerationListResponse {
    pub generations: Vec<GenerationDto>,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub generation: GenerationDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInput {
    #[serde(default)]
    pub id: Option<String>,
    pub image_url: String,
    pub video_url: String,
    pub prompt: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub generations: Vec<GenerationInput>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
