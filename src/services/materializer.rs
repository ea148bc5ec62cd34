use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::clients::ObjectStore;

pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Failed to download video: {0}")]
    Download(String),

    #[error("Failed to upload video: {0}")]
    Upload(String),
}

/// Copies a provider artifact into durable storage.
pub struct Materializer {
    http: reqwest::Client,
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl Materializer {
    #[must_use]
    pub fn new(http: reqwest::Client, store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            http,
            store,
            bucket: bucket.into(),
        }
    }

    /// Downloads `remote_url` in full, stores it under `owner_key` and returns the
    /// public URL. Nothing is written if the download fails.
    pub async fn materialize(
        &self,
        remote_url: &str,
        owner_key: &str,
    ) -> Result<String, MaterializeError> {
        debug!(url = %remote_url, "Downloading generated video");

        let response = self
            .http
            .get(remote_url)
            .send()
            .await
            .map_err(|e| MaterializeError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MaterializeError::Download(
                status.canonical_reason().unwrap_or(status.as_str()).to_string(),
            ));
        }

        let payload = response
            .bytes()
            .await
            .map_err(|e| MaterializeError::Download(e.to_string()))?;

        let path = format!(
            "{}/{}-generated.mp4",
            owner_key,
            chrono::Utc::now().timestamp_millis()
        );

        self.store
            .upload(&self.bucket, &path, payload, VIDEO_CONTENT_TYPE)
            .await
            .map_err(|e| MaterializeError::Upload(e.to_string()))?;

        let public_url = self.store.public_url(&self.bucket, &path);
        info!(path = %path, url = %public_url, "Video stored");

        Ok(public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::StoredObject;
    use async_trait::async_trait;
    use axum::{Router, http::StatusCode, routing::get};
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        uploads: Mutex<Vec<(String, String, usize, String)>>,
        reject: bool,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn upload(
            &self,
            bucket: &str,
            path: &str,
            body: Bytes,
            content_type: &str,
        ) -> anyhow::Result<()> {
            if self.reject {
                anyhow::bail!("Storage API error: 409 Conflict - The resource already exists");
            }
            self.uploads.lock().unwrap().push((
                bucket.to_string(),
                path.to_string(),
                body.len(),
                content_type.to_string(),
            ));
            Ok(())
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            format!("https://storage.test/{bucket}/{path}")
        }

        async fn list(&self, _bucket: &str, _prefix: &str) -> anyhow::Result<Vec<StoredObject>> {
            Ok(vec![])
        }

        async fn remove(&self, _bucket: &str, _paths: &[String]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn serve_artifacts() -> String {
        let app = Router::new()
            .route("/video.mp4", get(|| async { Bytes::from_static(b"fake-mp4-bytes") }))
            .route("/missing.mp4", get(|| async { StatusCode::NOT_FOUND }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_download_failure_writes_nothing() {
        let base = serve_artifacts().await;
        let store = Arc::new(RecordingStore::default());
        let materializer = Materializer::new(reqwest::Client::new(), store.clone(), "user-videos");

        let err = materializer
            .materialize(&format!("{base}/missing.mp4"), "anonymous")
            .await
            .unwrap_err();

        assert!(matches!(err, MaterializeError::Download(_)));
        assert_eq!(err.to_string(), "Failed to download video: Not Found");
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_materialize_uploads_video() {
        let base = serve_artifacts().await;
        let store = Arc::new(RecordingStore::default());
        let materializer = Materializer::new(reqwest::Client::new(), store.clone(), "user-videos");

        let url = materializer
            .materialize(&format!("{base}/video.mp4"), "anonymous")
            .await
            .unwrap();

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (bucket, path, size, content_type) = &uploads[0];
        assert_eq!(bucket, "user-videos");
        assert!(path.starts_with("anonymous/"));
        assert!(path.ends_with("-generated.mp4"));
        assert_eq!(*size, b"fake-mp4-bytes".len());
        assert_eq!(content_type, "video/mp4");
        assert_eq!(url, format!("https://storage.test/user-videos/{path}"));
    }

    #[tokio::test]
    async fn test_upload_rejection() {
        let base = serve_artifacts().await;
        let store = Arc::new(RecordingStore {
            reject: true,
            ..RecordingStore::default()
        });
        let materializer = Materializer::new(reqwest::Client::new(), store, "user-videos");

        let err = materializer
            .materialize(&format!("{base}/video.mp4"), "anonymous")
            .await
            .unwrap_err();

        assert!(matches!(err, MaterializeError::Upload(_)));
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_download_error() {
        let store = Arc::new(RecordingStore::default());
        let materializer = Materializer::new(reqwest::Client::new(), store.clone(), "user-videos");

        let err = materializer
            .materialize("http://127.0.0.1:1/video.mp4", "anonymous")
            .await
            .unwrap_err();

        assert!(matches!(err, MaterializeError::Download(_)));
        assert!(store.uploads.lock().unwrap().is_empty());
    }
}
