use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::ReplicateConfig;
use crate::domain::{GenerationParameters, VideoResolution};

/// Longest hold the predictions API accepts for `Prefer: wait`.
const MAX_WAIT_SECONDS: u64 = 60;

/// Input object for the image-to-video model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionInput {
    pub prompt: String,
    pub first_frame_image: String,
    pub duration: u8,
    pub resolution: VideoResolution,
    pub prompt_optimizer: bool,
}

impl PredictionInput {
    #[must_use]
    pub fn new(image_url: &str, prompt: &str, parameters: GenerationParameters) -> Self {
        Self {
            prompt: prompt.to_string(),
            first_frame_image: image_url.to_string(),
            duration: parameters.duration.seconds(),
            resolution: parameters.resolution,
            prompt_optimizer: parameters.prompt_optimizer,
        }
    }
}

/// A prediction as returned by the provider. `output` and `error` are left raw;
/// their shape depends on the model.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    #[serde(default)]
    latest_version: Option<ModelVersion>,
}

#[derive(Debug, Deserialize)]
struct ModelVersion {
    id: String,
}

#[derive(Serialize)]
struct CreatePrediction<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: &'a PredictionInput,
}

/// Remote video generation service.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Latest published version id of the configured model, if any.
    async fn latest_version(&self) -> Result<Option<String>>;

    /// Starts a prediction against a specific model version and returns at once.
    async fn create_prediction(&self, version: &str, input: &PredictionInput)
    -> Result<Prediction>;

    /// Starts a prediction against the model's current version, asking the
    /// provider to hold the request until it finishes or its wait limit passes.
    async fn create_and_wait(&self, input: &PredictionInput) -> Result<Prediction>;

    async fn get_prediction(&self, id: &str) -> Result<Prediction>;
}

#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    base_url: String,
    api_token: String,
    model_owner: String,
    model_name: String,
}

impl ReplicateClient {
    #[must_use]
    pub fn new(config: &ReplicateConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            model_owner: config.model_owner.clone(),
            model_name: config.model_name.clone(),
        }
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction> {
        if !response.status().is_success() {
            return Err(super::api_error("Replicate", response).await);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VideoProvider for ReplicateClient {
    async fn latest_version(&self) -> Result<Option<String>> {
        let url = format!(
            "{}/models/{}/{}",
            self.base_url, self.model_owner, self.model_name
        );

        debug!(model = %format!("{}/{}", self.model_owner, self.model_name), "Fetching latest model version");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("Replicate", response).await);
        }

        let model: ModelResponse = response.json().await?;
        Ok(model.latest_version.map(|v| v.id))
    }

    async fn create_prediction(
        &self,
        version: &str,
        input: &PredictionInput,
    ) -> Result<Prediction> {
        let url = format!("{}/predictions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&CreatePrediction {
                version: Some(version),
                input,
            })
            .send()
            .await?;

        Self::read_prediction(response).await
    }

    async fn create_and_wait(&self, input: &PredictionInput) -> Result<Prediction> {
        let url = format!(
            "{}/models/{}/{}/predictions",
            self.base_url, self.model_owner, self.model_name
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", format!("wait={MAX_WAIT_SECONDS}"))
            .timeout(Duration::from_secs(MAX_WAIT_SECONDS + 10))
            .json(&CreatePrediction {
                version: None,
                input,
            })
            .send()
            .await?;

        Self::read_prediction(response).await
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        let url = format!(
            "{}/predictions/{}",
            self.base_url,
            urlencoding::encode(id)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        Self::read_prediction(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VideoDuration;
    use serde_json::json;

    #[test]
    fn test_prediction_input_shape() {
        let params = GenerationParameters {
            duration: VideoDuration::Ten,
            resolution: VideoResolution::P768,
            prompt_optimizer: true,
        };
        let input = PredictionInput::new("https://img/a.png", "a cat jumps", params);

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "prompt": "a cat jumps",
                "first_frame_image": "https://img/a.png",
                "duration": 10,
                "resolution": "768p",
                "prompt_optimizer": true
            })
        );
    }

    #[test]
    fn test_create_body_omits_missing_version() {
        let input = PredictionInput::new("https://img/a.png", "a cat jumps", GenerationParameters::default());
        let body = serde_json::to_value(CreatePrediction {
            version: None,
            input: &input,
        })
        .unwrap();
        assert!(body.get("version").is_none());
        assert_eq!(body["input"]["duration"], 6);
    }

    #[test]
    fn test_prediction_without_output() {
        let prediction: Prediction =
            serde_json::from_value(json!({ "id": "p1", "status": "processing" })).unwrap();
        assert!(prediction.output.is_none());
        assert!(prediction.error.is_none());
    }
}
