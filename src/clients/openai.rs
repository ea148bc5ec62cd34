use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::OpenAiConfig;

/// Request body for the Responses API.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRequest {
    pub model: String,
    pub instructions: String,
    pub input: String,
    pub max_output_tokens: u32,
}

/// The parts of a Responses API reply that can carry generated text.
///
/// Depending on the model and SDK generation the text shows up in
/// `output_text`, in `output[].content[].text`, or in chat-style `choices`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub output: Option<Vec<OutputItem>>,
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Option<Vec<ContentPart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPart {
    /// Either a plain string or an object with a `value` string.
    #[serde(default)]
    pub text: Option<Value>,
}

impl ContentPart {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        let text = self.text.as_ref()?;
        text.as_str()
            .or_else(|| text.get("value").and_then(Value::as_str))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<Value>,
}

/// Language model used to turn a short description into an animation prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    async fn respond(&self, request: &ResponseRequest) -> Result<ResponseBody>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    #[must_use]
    pub fn new(config: &OpenAiConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn respond(&self, request: &ResponseRequest) -> Result<ResponseBody> {
        let url = format!("{}/responses", self.base_url);

        debug!(model = %request.model, input_len = request.input.len(), "Requesting OpenAI response");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("OpenAI", response).await);
        }

        let body: ResponseBody = response.json().await?;
        Ok(body)
    }
}
