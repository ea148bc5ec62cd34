use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use super::ApiError;

/// `Json` extractor whose rejections use the API error body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(&rejection)),
        }
    }
}

fn json_rejection(rejection: &JsonRejection) -> ApiError {
    ApiError::validation(rejection.body_text())
}

pub fn validate_http_url<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(value),
        _ => Err(ApiError::validation(format!("{field} must be a valid URL"))),
    }
}

/// Checks a length in characters, not bytes.
pub fn validate_length<'a>(
    field: &str,
    value: &'a str,
    min: usize,
    max: Option<usize>,
) -> Result<&'a str, ApiError> {
    let len = value.chars().count();
    if len < min {
        return Err(ApiError::validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if let Some(max) = max
        && len > max
    {
        return Err(ApiError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value)
}

pub fn validate_job_id(job_id: &str) -> Result<&str, ApiError> {
    let trimmed = job_id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Task ID is required"));
    }
    Ok(trimmed)
}

/// Normalises a client timestamp to UTC RFC 3339 with milliseconds.
pub fn normalize_timestamp(field: &str, value: &str) -> Result<String, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        })
        .map_err(|_| ApiError::validation(format!("{field} must be an RFC 3339 timestamp")))
}
