#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    routing::get,
};
use bytes::Bytes;
use doodlemation::api::{self, AppState};
use doodlemation::clients::{
    ObjectStore, Prediction, PredictionInput, ResponseBody, ResponseRequest, StoredObject,
    TextGenerator, VideoProvider,
};
use doodlemation::config::Config;
use doodlemation::state::{Providers, SharedState};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const MODEL_VERSION: &str = "v-test-1";

/// Language model that always answers with the same text.
pub struct ScriptedText {
    pub reply: String,
    pub calls: AtomicUsize,
}

impl ScriptedText {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn respond(&self, _request: &ResponseRequest) -> anyhow::Result<ResponseBody> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResponseBody {
            output_text: Some(self.reply.clone()),
            ..ResponseBody::default()
        })
    }
}

/// Video provider replaying a fixed sequence of poll answers. The last answer
/// repeats once the script runs out.
#[derive(Default)]
pub struct ScriptedVideo {
    pub script: Mutex<VecDeque<Prediction>>,
    pub last: Mutex<Option<Prediction>>,
    pub created: Mutex<Vec<PredictionInput>>,
    pub version_lookups: AtomicUsize,
    pub polls: AtomicUsize,
}

impl ScriptedVideo {
    pub fn with_script(script: Vec<Prediction>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    fn next(&self) -> anyhow::Result<Prediction> {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(prediction) = script.pop_front() {
            *last = Some(prediction);
        }
        last.clone()
            .ok_or_else(|| anyhow::anyhow!("Replicate API error: 404 Not Found - The requested resource could not be found."))
    }
}

#[async_trait]
impl VideoProvider for ScriptedVideo {
    async fn latest_version(&self) -> anyhow::Result<Option<String>> {
        self.version_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some(MODEL_VERSION.to_string()))
    }

    async fn create_prediction(
        &self,
        _version: &str,
        input: &PredictionInput,
    ) -> anyhow::Result<Prediction> {
        self.created.lock().unwrap().push(input.clone());
        Ok(prediction("p1", "starting", None, None))
    }

    async fn create_and_wait(&self, input: &PredictionInput) -> anyhow::Result<Prediction> {
        self.created.lock().unwrap().push(input.clone());
        self.next()
    }

    async fn get_prediction(&self, _id: &str) -> anyhow::Result<Prediction> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.next()
    }
}

pub fn prediction(id: &str, status: &str, output: Option<Value>, error: Option<Value>) -> Prediction {
    Prediction {
        id: id.to_string(),
        status: status.to_string(),
        output,
        error,
    }
}

pub fn succeeded_with(id: &str, url: &str) -> Prediction {
    prediction(id, "succeeded", Some(json!({ "url": url })), None)
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<(String, String), (Bytes, String)>>,
    pub reject_uploads: bool,
}

impl MemoryStore {
    pub fn rejecting() -> Self {
        Self {
            reject_uploads: true,
            ..Self::default()
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn paths_in(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<()> {
        if self.reject_uploads {
            anyhow::bail!("Storage API error: 403 Forbidden - new row violates row-level security policy");
        }
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), path.to_string()),
            (body, content_type.to_string()),
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.test/{bucket}/{path}")
    }

    async fn list(&self, _bucket: &str, _prefix: &str) -> anyhow::Result<Vec<StoredObject>> {
        Ok(vec![])
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> anyhow::Result<()> {
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub text: Arc<ScriptedText>,
    pub video: Arc<ScriptedVideo>,
    pub storage: Arc<MemoryStore>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    let db_path = std::env::temp_dir().join(format!("doodlemation-test-{}.db", uuid::Uuid::new_v4()));
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), ScriptedVideo::default(), MemoryStore::default()).await
}

pub async fn spawn_app_with(config: Config, video: ScriptedVideo, storage: MemoryStore) -> TestApp {
    let text = Arc::new(ScriptedText::new(
        "The sun slowly spins its rays while the tiny house waves hello",
    ));
    let video = Arc::new(video);
    let storage = Arc::new(storage);

    let providers = Providers {
        text: text.clone(),
        video: video.clone(),
        storage: storage.clone(),
    };

    let shared = SharedState::with_providers(config, providers)
        .await
        .expect("Failed to create shared state");
    let state = api::create_app_state(Arc::new(shared), None);

    TestApp {
        router: api::router(state.clone()),
        state,
        text,
        video,
        storage,
    }
}

/// Serves `/video.mp4`, a 404 at `/missing.mp4` and `/slow.mp4`, which
/// answers after 300ms, on a random local port.
pub async fn serve_artifacts() -> String {
    let app = Router::new()
        .route("/video.mp4", get(|| async { Bytes::from_static(b"fake-mp4-bytes") }))
        .route(
            "/slow.mp4",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                Bytes::from_static(b"slow-mp4-bytes")
            }),
        )
        .route("/missing.mp4", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: &TestApp, request: Request<Body>) -> TestResponse {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get_json(app: &TestApp, uri: &str) -> TestResponse {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn delete(app: &TestApp, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}
