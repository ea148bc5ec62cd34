use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::clients::{Prediction, VideoProvider};
use crate::domain::{JobId, JobState, JobStatus, ProviderFailure, ProviderOutput};

/// The provider could not be reached or answered with an error. Says nothing
/// about the state of the job itself.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StatusCheckError(pub String);

impl From<anyhow::Error> for StatusCheckError {
    fn from(err: anyhow::Error) -> Self {
        Self(err.to_string())
    }
}

/// Reads job state back from the provider. One request per poll, no waiting.
pub struct StatusTracker {
    provider: Arc<dyn VideoProvider>,
}

impl StatusTracker {
    #[must_use]
    pub fn new(provider: Arc<dyn VideoProvider>) -> Self {
        Self { provider }
    }

    pub async fn poll(&self, job_id: &JobId) -> Result<JobState, StatusCheckError> {
        let prediction = self.provider.get_prediction(job_id.as_str()).await?;
        debug!(job_id = %job_id, status = %prediction.status, "Polled prediction");
        Ok(interpret(&prediction))
    }
}

/// Maps a raw prediction onto a [`JobState`].
#[must_use]
pub fn interpret(prediction: &Prediction) -> JobState {
    match JobStatus::from_provider(&prediction.status) {
        JobStatus::Succeeded => prediction
            .output
            .as_ref()
            .and_then(ProviderOutput::decode)
            .and_then(ProviderOutput::into_url)
            .map_or(JobState::MissingOutput, |result_url| JobState::Succeeded {
                result_url,
            }),
        status @ (JobStatus::Failed | JobStatus::Canceled) => JobState::Failed {
            status,
            message: ProviderFailure::decode(prediction.error.as_ref()).into_message(),
        },
        status => JobState::InProgress(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::PredictionInput;
    use async_trait::async_trait;
    use serde_json::json;

    fn prediction(value: serde_json::Value) -> Prediction {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_succeeded_with_url_accessor() {
        let state = interpret(&prediction(json!({
            "id": "p1",
            "status": "succeeded",
            "output": { "url": "https://replicate.delivery/x.mp4" }
        })));
        assert_eq!(
            state,
            JobState::Succeeded {
                result_url: "https://replicate.delivery/x.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_failed_with_string_error() {
        let state = interpret(&prediction(json!({
            "id": "p1",
            "status": "failed",
            "error": "boom"
        })));
        assert_eq!(
            state,
            JobState::Failed {
                status: JobStatus::Failed,
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_canceled_without_error_gets_default_message() {
        let state = interpret(&prediction(json!({ "id": "p1", "status": "canceled" })));
        assert_eq!(
            state,
            JobState::Failed {
                status: JobStatus::Canceled,
                message: "Prediction failed".to_string()
            }
        );
    }

    #[test]
    fn test_processing_has_status_only() {
        let state = interpret(&prediction(json!({ "id": "p1", "status": "processing" })));
        assert_eq!(state, JobState::InProgress(JobStatus::Processing));

        let state = interpret(&prediction(json!({ "id": "p1", "status": "starting" })));
        assert_eq!(state, JobState::InProgress(JobStatus::Queued));
    }

    #[test]
    fn test_succeeded_without_usable_output() {
        for output in [json!(null), json!([]), json!({ "video": 1 }), json!("")] {
            let state = interpret(&prediction(json!({
                "id": "p1",
                "status": "succeeded",
                "output": output
            })));
            assert_eq!(state, JobState::MissingOutput);
        }
    }

    struct UnreachableProvider;

    #[async_trait]
    impl VideoProvider for UnreachableProvider {
        async fn latest_version(&self) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection refused")
        }

        async fn create_prediction(
            &self,
            _version: &str,
            _input: &PredictionInput,
        ) -> anyhow::Result<Prediction> {
            anyhow::bail!("connection refused")
        }

        async fn create_and_wait(&self, _input: &PredictionInput) -> anyhow::Result<Prediction> {
            anyhow::bail!("connection refused")
        }

        async fn get_prediction(&self, _id: &str) -> anyhow::Result<Prediction> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_a_failed_job() {
        let tracker = StatusTracker::new(Arc::new(UnreachableProvider));
        let err = tracker.poll(&JobId::new("p1")).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }
}
