//! Domain types for video generation jobs with strong typing.
//!
//! This module provides the type-safe primitives shared by the orchestration
//! services: job identifiers, job status, rendering parameters, and the decoding
//! of provider output and error payloads.

pub mod events;
pub mod output;

pub use output::{ProviderFailure, ProviderOutput};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model identifier reported to clients.
pub const VIDEO_MODEL: &str = "minimax/hailuo-02";

/// Opaque identifier assigned by the video provider to a submitted job.
///
/// The newtype keeps provider job ids from being mixed up with generation
/// record ids, which are also strings.
///
/// # Examples
///
/// ```rust
/// use doodlemation::domain::JobId;
///
/// let id = JobId::new("abc123");
/// assert_eq!(id.as_str(), "abc123");
/// assert_eq!(id.to_string(), "abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Synthetic id returned by the blocking submission strategy.
    pub const COMPLETED: &'static str = "completed";

    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn completed() -> Self {
        Self(Self::COMPLETED.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle of a generation job as observed on the provider.
///
/// `queued → processing → {succeeded | failed | canceled}`. The system never
/// sets a status itself; it only reads it back from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Maps a raw provider status onto the lifecycle.
    ///
    /// `starting` is the provider's name for a queued job. Anything unknown is
    /// treated as still in progress so callers keep polling.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Processing)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" | "starting" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length of the generated clip in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VideoDuration {
    #[default]
    Six,
    Ten,
}

impl VideoDuration {
    #[must_use]
    pub const fn seconds(self) -> u8 {
        match self {
            Self::Six => 6,
            Self::Ten => 10,
        }
    }
}

impl TryFrom<u8> for VideoDuration {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            6 => Ok(Self::Six),
            10 => Ok(Self::Ten),
            other => Err(format!("duration must be 6 or 10 seconds, got {other}")),
        }
    }
}

impl From<VideoDuration> for u8 {
    fn from(duration: VideoDuration) -> Self {
        duration.seconds()
    }
}

/// Output resolution accepted by the video provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoResolution {
    #[default]
    #[serde(rename = "512p")]
    P512,
    #[serde(rename = "768p")]
    P768,
    #[serde(rename = "1080p")]
    P1080,
}

impl VideoResolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P512 => "512p",
            Self::P768 => "768p",
            Self::P1080 => "1080p",
        }
    }
}

impl fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering parameters for one generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    pub duration: VideoDuration,
    pub resolution: VideoResolution,
    pub prompt_optimizer: bool,
}

/// What the submitter hands back once the provider accepted a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Present only when the blocking strategy already resolved the job.
    pub result_url: Option<String>,
}

/// Observed state of a job after one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Not terminal yet; the caller should poll again later.
    InProgress(JobStatus),
    Succeeded { result_url: String },
    /// Provider reported `failed` or `canceled`.
    Failed { status: JobStatus, message: String },
    /// Provider reported success but the output had no usable reference.
    MissingOutput,
}

impl JobState {
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::InProgress(status) | Self::Failed { status, .. } => *status,
            Self::Succeeded { .. } | Self::MissingOutput => JobStatus::Succeeded,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress(_))
    }
}

/// A job as known locally: the request that created it plus the last observed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub job_id: JobId,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub parameters: GenerationParameters,
    pub source_image_url: String,
    pub prompt: String,
}

impl GenerationJob {
    #[must_use]
    pub fn submitted(
        handle: &JobHandle,
        source_image_url: impl Into<String>,
        prompt: impl Into<String>,
        parameters: GenerationParameters,
    ) -> Self {
        Self {
            job_id: handle.job_id.clone(),
            status: handle.status,
            result_url: handle.result_url.clone(),
            error_message: None,
            parameters,
            source_image_url: source_image_url.into(),
            prompt: prompt.into(),
        }
    }

    /// Applies a freshly observed state.
    pub fn observe(&mut self, state: &JobState) {
        self.status = state.status();
        match state {
            JobState::Succeeded { result_url } => {
                self.result_url = Some(result_url.clone());
                self.error_message = None;
            }
            JobState::Failed { message, .. } => {
                self.result_url = None;
                self.error_message = Some(message.clone());
            }
            JobState::InProgress(_) | JobState::MissingOutput => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_provider() {
        assert_eq!(JobStatus::from_provider("starting"), JobStatus::Queued);
        assert_eq!(JobStatus::from_provider("processing"), JobStatus::Processing);
        assert_eq!(JobStatus::from_provider("succeeded"), JobStatus::Succeeded);
        assert_eq!(JobStatus::from_provider("failed"), JobStatus::Failed);
        assert_eq!(JobStatus::from_provider("canceled"), JobStatus::Canceled);
        assert_eq!(JobStatus::from_provider("warming_up"), JobStatus::Processing);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_duration_serde() {
        let d: VideoDuration = serde_json::from_str("10").unwrap();
        assert_eq!(d, VideoDuration::Ten);
        assert_eq!(serde_json::to_string(&VideoDuration::Six).unwrap(), "6");
        assert!(serde_json::from_str::<VideoDuration>("7").is_err());
    }

    #[test]
    fn test_resolution_serde() {
        let r: VideoResolution = serde_json::from_str("\"1080p\"").unwrap();
        assert_eq!(r, VideoResolution::P1080);
        assert_eq!(
            serde_json::to_string(&VideoResolution::P512).unwrap(),
            "\"512p\""
        );
        assert!(serde_json::from_str::<VideoResolution>("\"720p\"").is_err());
    }

    #[test]
    fn test_job_observes_terminal_state() {
        let handle = JobHandle {
            job_id: JobId::new("p1"),
            status: JobStatus::Queued,
            result_url: None,
        };
        let mut job = GenerationJob::submitted(
            &handle,
            "https://img/x.png",
            "a dragon waves",
            GenerationParameters::default(),
        );

        job.observe(&JobState::InProgress(JobStatus::Processing));
        assert_eq!(job.status, JobStatus::Processing);

        job.observe(&JobState::Failed {
            status: JobStatus::Canceled,
            message: "stopped".to_string(),
        });
        assert_eq!(job.status, JobStatus::Canceled);
        assert_eq!(job.error_message.as_deref(), Some("stopped"));
        assert!(job.result_url.is_none());
    }
}
