use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::StorageConfig;

/// One entry of a bucket listing. Folders come back without an `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredObject {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredObject {
    #[must_use]
    pub const fn is_folder(&self) -> bool {
        self.id.is_none()
    }
}

/// Durable object storage for uploaded images and generated videos.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes an object. Never overwrites an existing one.
    async fn upload(&self, bucket: &str, path: &str, body: Bytes, content_type: &str)
    -> Result<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Lists the direct children of `prefix` (empty for the bucket root).
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;
}

/// Supabase Storage REST API.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
    cache_control_seconds: u32,
}

impl SupabaseStorage {
    const LIST_LIMIT: u32 = 1000;

    #[must_use]
    pub fn new(config: &StorageConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            cache_control_seconds: config.cache_control_seconds,
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            bucket,
            encode_path(path)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()> {
        debug!(bucket, path, size = body.len(), "Uploading object");

        let response = self
            .authorized(self.client.post(self.object_url(bucket, path)))
            .header("Content-Type", content_type)
            .header("Cache-Control", format!("max-age={}", self.cache_control_seconds))
            .header("x-upsert", "false")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("Storage", response).await);
        }

        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            bucket,
            encode_path(path)
        )
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, bucket);

        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({
                "prefix": prefix,
                "limit": Self::LIST_LIMIT,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("Storage", response).await);
        }

        Ok(response.json().await?)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let url = format!("{}/storage/v1/object/{}", self.base_url, bucket);

        let response = self
            .authorized(self.client.delete(&url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("Storage", response).await);
        }

        Ok(())
    }
}
