//! Hands generation jobs to the video provider.
//!
//! Two strategies exist behind [`SubmissionStrategy`]: [`AsyncSubmission`]
//! returns the provider job id immediately and leaves tracking to the caller,
//! [`SyncSubmission`] holds the request until the job is done.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::clients::{Prediction, PredictionInput, VideoProvider};
use crate::config::{ReplicateConfig, SubmissionMode};
use crate::domain::{GenerationParameters, JobHandle, JobId, JobState, JobStatus};
use crate::services::status_tracker::interpret;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Provider(String),

    #[error("Failed to get latest model version")]
    MissingVersion,

    #[error("{0}")]
    JobFailed(String),

    #[error("Video generation finished without an output")]
    MissingOutput,

    #[error("Video generation did not finish within {0} seconds")]
    Timeout(u64),
}

impl From<anyhow::Error> for SubmissionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

/// What the caller asked to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub image_url: String,
    pub prompt: String,
    pub parameters: GenerationParameters,
}

impl GenerationRequest {
    #[must_use]
    pub fn input(&self) -> PredictionInput {
        PredictionInput::new(&self.image_url, &self.prompt, self.parameters)
    }
}

#[async_trait]
pub trait SubmissionStrategy: Send + Sync {
    /// Starts a job on the provider.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::Provider`] on transport or provider errors, with the
    ///   upstream message
    /// - [`SubmissionError::MissingVersion`] if the model has no published version
    /// - [`SubmissionError::JobFailed`], [`SubmissionError::MissingOutput`] and
    ///   [`SubmissionError::Timeout`] from the blocking strategy only
    async fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, SubmissionError>;

    fn mode(&self) -> SubmissionMode;
}

/// Creates a prediction against the model's latest version and returns its id.
pub struct AsyncSubmission {
    provider: Arc<dyn VideoProvider>,
    version: Arc<OnceCell<String>>,
}

impl AsyncSubmission {
    /// `version` is shared so every submitter in the process resolves it once.
    #[must_use]
    pub fn new(provider: Arc<dyn VideoProvider>, version: Arc<OnceCell<String>>) -> Self {
        Self { provider, version }
    }

    async fn model_version(&self) -> Result<&str, SubmissionError> {
        let version = self
            .version
            .get_or_try_init(|| async {
                debug!("Resolving latest model version");
                let version = self
                    .provider
                    .latest_version()
                    .await?
                    .ok_or(SubmissionError::MissingVersion)?;
                info!(version = %version, "Cached model version");
                Ok::<_, SubmissionError>(version)
            })
            .await?;
        Ok(version.as_str())
    }
}

#[async_trait]
impl SubmissionStrategy for AsyncSubmission {
    async fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, SubmissionError> {
        let version = self.model_version().await?;
        let prediction = self
            .provider
            .create_prediction(version, &request.input())
            .await?;

        info!(job_id = %prediction.id, status = %prediction.status, "Prediction started");

        Ok(JobHandle {
            job_id: JobId::new(prediction.id),
            status: JobStatus::from_provider(&prediction.status),
            result_url: None,
        })
    }

    fn mode(&self) -> SubmissionMode {
        SubmissionMode::Async
    }
}

/// Waits for the job to finish before returning.
pub struct SyncSubmission {
    provider: Arc<dyn VideoProvider>,
    deadline: Duration,
    poll_interval: Duration,
}

impl SyncSubmission {
    #[must_use]
    pub fn new(provider: Arc<dyn VideoProvider>, deadline: Duration, poll_interval: Duration) -> Self {
        Self {
            provider,
            deadline,
            poll_interval,
        }
    }

    async fn run_to_completion(&self, input: &PredictionInput) -> Result<Prediction, SubmissionError> {
        let mut prediction = self.provider.create_and_wait(input).await?;
        debug!(job_id = %prediction.id, status = %prediction.status, "Prediction created with wait");

        while !JobStatus::from_provider(&prediction.status).is_terminal() {
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.provider.get_prediction(&prediction.id).await?;
        }

        Ok(prediction)
    }
}

#[async_trait]
impl SubmissionStrategy for SyncSubmission {
    async fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, SubmissionError> {
        let prediction = tokio::time::timeout(self.deadline, self.run_to_completion(&request.input()))
            .await
            .map_err(|_| SubmissionError::Timeout(self.deadline.as_secs()))??;

        match interpret(&prediction) {
            JobState::Succeeded { result_url } => {
                info!(job_id = %prediction.id, "Prediction finished");
                Ok(JobHandle {
                    job_id: JobId::completed(),
                    status: JobStatus::Succeeded,
                    result_url: Some(result_url),
                })
            }
            JobState::Failed { message, .. } => Err(SubmissionError::JobFailed(message)),
            JobState::MissingOutput => Err(SubmissionError::MissingOutput),
            JobState::InProgress(_) => Err(SubmissionError::Timeout(self.deadline.as_secs())),
        }
    }

    fn mode(&self) -> SubmissionMode {
        SubmissionMode::Sync
    }
}

/// Builds the strategy selected in config.
#[must_use]
pub fn strategy_for(
    config: &ReplicateConfig,
    provider: Arc<dyn VideoProvider>,
    version: Arc<OnceCell<String>>,
) -> Arc<dyn SubmissionStrategy> {
    match config.submission_strategy {
        SubmissionMode::Async => Arc::new(AsyncSubmission::new(provider, version)),
        SubmissionMode::Sync => Arc::new(SyncSubmission::new(
            provider,
            Duration::from_secs(config.sync_timeout_seconds),
            Duration::from_secs(config.sync_poll_interval_seconds),
        )),
    }
}
