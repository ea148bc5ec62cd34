pub mod openai;
pub mod replicate;
pub mod storage;

pub use openai::{OpenAiClient, ResponseBody, ResponseRequest, TextGenerator};
pub use replicate::{Prediction, PredictionInput, ReplicateClient, VideoProvider};
pub use storage::{ObjectStore, StoredObject, SupabaseStorage};

use serde_json::Value;

/// Builds the pooled HTTP client shared by the provider clients.
pub fn build_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("DoodleMation/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))
}

/// Pulls the most useful message out of an upstream error body.
///
/// Providers disagree on the shape: Replicate sends `detail`, Supabase sends
/// `message`, OpenAI nests it under `error.message`.
pub(crate) fn upstream_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    ["detail", "message"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .or_else(|| json.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| json.get("error").and_then(Value::as_str))
        .map_or_else(|| body.trim().to_string(), str::to_string)
}

/// Formats a non-success response as `<service> API error: <status> - <message>`.
pub(crate) async fn api_error(service: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::anyhow!(
        "{} API error: {} - {}",
        service,
        status,
        upstream_message(&body)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_shapes() {
        assert_eq!(upstream_message(r#"{"detail":"Invalid version"}"#), "Invalid version");
        assert_eq!(
            upstream_message(r#"{"statusCode":"409","message":"The resource already exists"}"#),
            "The resource already exists"
        );
        assert_eq!(
            upstream_message(r#"{"error":{"message":"Incorrect API key"}}"#),
            "Incorrect API key"
        );
        assert_eq!(upstream_message(r#"{"error":"Bucket not found"}"#), "Bucket not found");
        assert_eq!(upstream_message("  Bad Gateway "), "Bad Gateway");
    }
}
