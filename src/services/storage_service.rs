//! User image uploads and retention pruning for the storage buckets.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::clients::{ObjectStore, StoredObject};
use crate::config::{StorageConfig, UploadConfig};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid file type. Only JPEG, PNG, and WebP are allowed.")]
    InvalidType,

    #[error("File too large. Maximum size is {0}MB.")]
    TooLarge(usize),

    #[error("Invalid file name.")]
    InvalidName,

    #[error("Failed to upload image: {0}")]
    Upload(String),

    #[error("Storage request failed: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StorageError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: String,
    pub file_name: String,
}

pub struct StorageService {
    store: Arc<dyn ObjectStore>,
    image_bucket: String,
    video_bucket: String,
    uploads: UploadConfig,
    owner_key: String,
}

impl StorageService {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        storage: &StorageConfig,
        uploads: UploadConfig,
        owner_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            image_bucket: storage.image_bucket.clone(),
            video_bucket: storage.video_bucket.clone(),
            uploads,
            owner_key: owner_key.into(),
        }
    }

    #[must_use]
    pub fn buckets(&self) -> [&str; 2] {
        [&self.image_bucket, &self.video_bucket]
    }

    /// Resolves the content type of an upload, guessing from the file name
    /// when the part did not declare one.
    #[must_use]
    pub fn content_type_for(file_name: &str, declared: Option<&str>) -> String {
        declared
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .map_or_else(
                || mime_guess::from_path(file_name).first_or_octet_stream().to_string(),
                str::to_string,
            )
    }

    pub async fn upload_image(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<UploadedImage, StorageError> {
        let file_name = object_file_name(file_name).ok_or(StorageError::InvalidName)?;
        let content_type = Self::content_type_for(file_name, content_type);
        if !self.uploads.allowed_types.iter().any(|t| *t == content_type) {
            return Err(StorageError::InvalidType);
        }

        if body.len() > self.uploads.max_bytes {
            return Err(StorageError::TooLarge(self.uploads.max_bytes / (1024 * 1024)));
        }

        let path = format!(
            "{}/{}-{}",
            self.owner_key,
            Utc::now().timestamp_millis(),
            file_name
        );

        self.store
            .upload(&self.image_bucket, &path, body, &content_type)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        let url = self.store.public_url(&self.image_bucket, &path);
        info!(path = %path, "Image uploaded");

        Ok(UploadedImage {
            url,
            file_name: file_name.to_string(),
        })
    }

    /// Removes objects in `bucket` created more than `older_than_days` ago.
    /// Looks one folder level deep, which is where uploads are written.
    pub async fn prune_bucket(&self, bucket: &str, older_than_days: u32) -> Result<usize, StorageError> {
        let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));

        let mut stale = Vec::new();
        for entry in self.store.list(bucket, "").await? {
            if entry.is_folder() {
                let children = self.store.list(bucket, &entry.name).await?;
                stale.extend(
                    stale_paths(&children, cutoff)
                        .map(|name| format!("{}/{}", entry.name, name)),
                );
            } else if is_stale(&entry, cutoff) {
                stale.push(entry.name);
            }
        }

        debug!(bucket, count = stale.len(), "Stale objects found");
        self.store.remove(bucket, &stale).await?;

        if !stale.is_empty() {
            info!(bucket, removed = stale.len(), "Pruned old objects");
        }

        Ok(stale.len())
    }

    /// Prunes both buckets.
    pub async fn prune_all(&self, older_than_days: u32) -> Result<Vec<(String, usize)>, StorageError> {
        let mut results = Vec::new();
        for bucket in self.buckets() {
            let removed = self.prune_bucket(bucket, older_than_days).await?;
            results.push((bucket.to_string(), removed));
        }
        Ok(results)
    }
}

/// The last path segment of a client supplied file name, so an upload can
/// only land directly under the owner folder.
fn object_file_name(name: &str) -> Option<&str> {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();
    (!base.is_empty() && base != "." && base != "..").then_some(base)
}

fn is_stale(entry: &StoredObject, cutoff: DateTime<Utc>) -> bool {
    entry.created_at.is_some_and(|created| created < cutoff)
}

fn stale_paths(
    entries: &[StoredObject],
    cutoff: DateTime<Utc>,
) -> impl Iterator<Item = &str> {
    entries
        .iter()
        .filter(move |entry| !entry.is_folder() && is_stale(entry, cutoff))
        .map(|entry| entry.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        listings: HashMap<String, Vec<StoredObject>>,
        uploads: Mutex<Vec<(String, String, String)>>,
        removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn upload(
            &self,
            bucket: &str,
            path: &str,
            _body: Bytes,
            content_type: &str,
        ) -> anyhow::Result<()> {
            self.uploads.lock().unwrap().push((
                bucket.to_string(),
                path.to_string(),
                content_type.to_string(),
            ));
            Ok(())
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            format!("https://storage.test/{bucket}/{path}")
        }

        async fn list(&self, _bucket: &str, prefix: &str) -> anyhow::Result<Vec<StoredObject>> {
            Ok(self.listings.get(prefix).cloned().unwrap_or_default())
        }

        async fn remove(&self, _bucket: &str, paths: &[String]) -> anyhow::Result<()> {
            self.removed.lock().unwrap().extend_from_slice(paths);
            Ok(())
        }
    }

    fn object(name: &str, age_days: Option<i64>) -> StoredObject {
        StoredObject {
            name: name.to_string(),
            id: age_days.map(|_| format!("id-{name}")),
            created_at: age_days.map(|days| Utc::now() - Duration::days(days)),
        }
    }

    fn service(store: Arc<MemoryStore>) -> StorageService {
        StorageService::new(
            store,
            &StorageConfig::default(),
            UploadConfig::default(),
            "anonymous",
        )
    }

    #[test]
    fn test_content_type_guessing() {
        assert_eq!(StorageService::content_type_for("a.png", None), "image/png");
        assert_eq!(
            StorageService::content_type_for("a.png", Some("image/webp")),
            "image/webp"
        );
        assert_eq!(
            StorageService::content_type_for("a.jpg", Some("application/octet-stream")),
            "image/jpeg"
        );
    }

    #[tokio::test]
    async fn test_upload_image_validates() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        let err = service
            .upload_image("notes.txt", Some("text/plain"), Bytes::from_static(b"hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidType));

        let big = Bytes::from(vec![0u8; 10 * 1024 * 1024 + 1]);
        let err = service
            .upload_image("big.png", Some("image/png"), big)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File too large. Maximum size is 10MB.");
        assert!(store.uploads.lock().unwrap().is_empty());

        let uploaded = service
            .upload_image("cat.png", None, Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(uploaded.file_name, "cat.png");
        assert!(uploaded.url.starts_with("https://storage.test/user-images/anonymous/"));
        assert!(uploaded.url.ends_with("-cat.png"));

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads[0].0, "user-images");
        assert_eq!(uploads[0].2, "image/png");
    }

    #[test]
    fn test_object_file_name_keeps_last_segment() {
        assert_eq!(object_file_name("cat.png"), Some("cat.png"));
        assert_eq!(object_file_name("../../other/x.png"), Some("x.png"));
        assert_eq!(object_file_name("C:\\Users\\me\\cat.png"), Some("cat.png"));
        assert_eq!(object_file_name("a..b.png"), Some("a..b.png"));
        assert_eq!(object_file_name(".."), None);
        assert_eq!(object_file_name("x/.."), None);
        assert_eq!(object_file_name("dir/"), None);
    }

    #[tokio::test]
    async fn test_upload_image_stays_in_owner_folder() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        let uploaded = service
            .upload_image("../../../user-videos/anonymous/x.png", None, Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(uploaded.file_name, "x.png");

        let path = store.uploads.lock().unwrap()[0].1.clone();
        assert!(path.starts_with("anonymous/"));
        assert!(path.ends_with("-x.png"));
        assert!(!path.contains(".."));
        assert_eq!(uploaded.url, format!("https://storage.test/user-images/{path}"));

        let err = service
            .upload_image("images/..", Some("image/png"), Bytes::from_static(b"png"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidName));
        assert_eq!(store.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_bucket_removes_old_objects() {
        let mut listings = HashMap::new();
        listings.insert(
            String::new(),
            vec![object("anonymous", None), object("root-old.png", Some(30))],
        );
        listings.insert(
            "anonymous".to_string(),
            vec![object("1-old.mp4", Some(8)), object("2-new.mp4", Some(1))],
        );
        let store = Arc::new(MemoryStore {
            listings,
            ..MemoryStore::default()
        });

        let removed = service(store.clone())
            .prune_bucket("user-videos", 7)
            .await
            .unwrap();

        assert_eq!(removed, 2);
        let mut paths = store.removed.lock().unwrap().clone();
        paths.sort();
        assert_eq!(paths, vec!["anonymous/1-old.mp4", "root-old.png"]);
    }
}
