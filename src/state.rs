use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, broadcast};

use crate::clients::{
    ObjectStore, OpenAiClient, ReplicateClient, SupabaseStorage, TextGenerator, VideoProvider,
    build_http_client,
};
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::services::{
    ForwardedForKey, GenerationService, KeyGenerator, Materializer, PeerAddressKey, PromptCache,
    PromptService, RateLimiter, StatusTracker, StorageService, Scheduler,
};
use crate::services::submission::strategy_for;

/// The external collaborators the services talk to.
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextGenerator>,
    pub video: Arc<dyn VideoProvider>,
    pub storage: Arc<dyn ObjectStore>,
}

impl Providers {
    /// HTTP clients for OpenAI, Replicate and Supabase Storage.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let openai_http = build_http_client(config.openai.request_timeout_seconds)?;
        let replicate_http = build_http_client(config.replicate.request_timeout_seconds)?;
        let storage_http = build_http_client(config.storage.request_timeout_seconds)?;

        Ok(Self {
            text: Arc::new(OpenAiClient::new(&config.openai, openai_http)),
            video: Arc::new(ReplicateClient::new(&config.replicate, replicate_http)),
            storage: Arc::new(SupabaseStorage::new(&config.storage, storage_http)),
        })
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub prompt_service: Arc<PromptService>,

    pub generation_service: Arc<GenerationService>,

    pub storage_service: Arc<StorageService>,

    /// Guards prompt enhancement and generation submits.
    pub api_limiter: RateLimiter,

    pub upload_limiter: RateLimiter,

    pub event_bus: broadcast::Sender<NotificationEvent>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let providers = Providers::from_config(&config)?;
        Self::with_providers(config, providers).await
    }

    pub async fn with_providers(config: Config, providers: Providers) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size);

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let cache = Arc::new(PromptCache::new(config.cache.prompt_capacity));
        let prompt_service = Arc::new(PromptService::new(providers.text, cache, &config.openai));

        let submitter = strategy_for(
            &config.replicate,
            providers.video.clone(),
            Arc::new(OnceCell::new()),
        );
        let tracker = StatusTracker::new(providers.video);

        let download_http = build_http_client(config.storage.download_timeout_seconds)?;
        let materializer = Materializer::new(
            download_http,
            providers.storage.clone(),
            config.storage.video_bucket.clone(),
        );

        let generation_service = Arc::new(GenerationService::new(
            submitter,
            tracker,
            materializer,
            store.clone(),
            event_bus.clone(),
            config.general.owner_key.clone(),
        ));

        let storage_service = Arc::new(StorageService::new(
            providers.storage,
            &config.storage,
            config.uploads.clone(),
            config.general.owner_key.clone(),
        ));

        let key_generator: Arc<dyn KeyGenerator> = if config.server.trust_forwarded_for {
            Arc::new(ForwardedForKey)
        } else {
            Arc::new(PeerAddressKey)
        };

        let api_limiter = RateLimiter::from_rule("api", config.rate_limit.api)
            .with_key_generator(key_generator.clone());
        let upload_limiter = RateLimiter::from_rule("upload", config.rate_limit.upload)
            .with_key_generator(key_generator);

        Ok(Self {
            config: Arc::new(config),
            store,
            prompt_service,
            generation_service,
            storage_service,
            api_limiter,
            upload_limiter,
            event_bus,
        })
    }

    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            vec![self.api_limiter.clone(), self.upload_limiter.clone()],
            self.generation_service.clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_seconds),
            self.storage_service.clone(),
            self.config.storage.prune_cron.clone(),
            self.config.storage.retention_days,
            self.event_bus.clone(),
        )
    }
}
