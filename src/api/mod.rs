use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::services::{GenerationService, PromptService, StorageService};
use crate::state::SharedState;

mod error;
mod events;
mod generate;
mod generations;
mod observability;
mod prompt;
mod rate_limit;
mod status;
mod system;
mod types;
mod upload;
mod validation;

pub use error::{ApiError, RATE_LIMIT_MESSAGE};
pub use types::*;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn event_bus(&self) -> &broadcast::Sender<NotificationEvent> {
        &self.shared.event_bus
    }

    #[must_use]
    pub fn prompt_service(&self) -> &Arc<PromptService> {
        &self.shared.prompt_service
    }

    #[must_use]
    pub fn generation_service(&self) -> &Arc<GenerationService> {
        &self.shared.generation_service
    }

    #[must_use]
    pub fn storage_service(&self) -> &Arc<StorageService> {
        &self.shared.storage_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();
    let upload_body_limit = state.config().uploads.max_bytes + MULTIPART_OVERHEAD_BYTES;

    let api_limited = Router::new()
        .route("/generate", post(generate::generate_video))
        .route("/prompt", post(prompt::enhance_prompt))
        .route_layer(middleware::from_fn_with_state(
            state.shared.api_limiter.clone(),
            rate_limit::enforce,
        ));

    let upload_limited = Router::new()
        .route("/upload", post(upload::upload_image))
        .layer(DefaultBodyLimit::max(upload_body_limit))
        .route_layer(middleware::from_fn_with_state(
            state.shared.upload_limiter.clone(),
            rate_limit::enforce,
        ));

    let api_router = Router::new()
        .merge(api_limited)
        .merge(upload_limited)
        .route("/status/", get(status::missing_job_id))
        .route("/status/{job_id}", get(status::get_status))
        .route(
            "/generations",
            get(generations::list_generations)
                .post(generations::create_generation)
                .delete(generations::clear_generations),
        )
        .route("/generations/import", post(generations::import_generations))
        .route("/generations/{id}", delete(generations::delete_generation))
        .route("/events", get(events::sse_handler))
        .route("/system/health/live", get(system::health_live))
        .route("/system/health/ready", get(system::health_ready))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}
