use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub openai: OpenAiConfig,

    pub replicate: ReplicateConfig,

    pub storage: StorageConfig,

    pub uploads: UploadConfig,

    pub cache: CacheConfig,

    pub rate_limit: RateLimitConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,

    /// Folder name used for stored artifacts until users exist.
    pub owner_key: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/doodlemation.db".to_string(),
            log_level: "info".to_string(),
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
            owner_key: "anonymous".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Rate-limit clients by the first `X-Forwarded-For` address instead of the
    /// socket peer. Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5173,
            cors_allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Read from `OPENAI_API_KEY` when empty.
    #[serde(skip_serializing)]
    pub api_key: String,

    pub base_url: String,

    pub model: String,

    pub max_output_tokens: u32,

    /// Request timeout in seconds (default: 60)
    pub request_timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-5-mini".to_string(),
            max_output_tokens: 10_000,
            request_timeout_seconds: 60,
        }
    }
}

/// How a generation job is handed to the video provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// Return the provider job id immediately; clients poll for the result.
    #[default]
    Async,
    /// Hold the request until the provider finishes the job.
    Sync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateConfig {
    /// Read from `REPLICATE_API_TOKEN` when empty.
    #[serde(skip_serializing)]
    pub api_token: String,

    pub base_url: String,

    pub model_owner: String,

    pub model_name: String,

    pub submission_strategy: SubmissionMode,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,

    /// Overall deadline for the blocking strategy (default: 300)
    pub sync_timeout_seconds: u64,

    /// Delay between provider reads while the blocking strategy waits (default: 2)
    pub sync_poll_interval_seconds: u64,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: "https://api.replicate.com/v1".to_string(),
            model_owner: "minimax".to_string(),
            model_name: "hailuo-02".to_string(),
            submission_strategy: SubmissionMode::Async,
            request_timeout_seconds: 30,
            sync_timeout_seconds: 300,
            sync_poll_interval_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Read from `SUPABASE_URL` when empty.
    pub base_url: String,

    /// Read from `SUPABASE_SERVICE_KEY` when empty.
    #[serde(skip_serializing)]
    pub service_key: String,

    pub image_bucket: String,

    pub video_bucket: String,

    pub cache_control_seconds: u32,

    pub request_timeout_seconds: u64,

    /// Timeout for downloading provider artifacts (default: 120)
    pub download_timeout_seconds: u64,

    /// Files older than this are removed by `prune`.
    pub retention_days: u32,

    /// Optional cron expression for pruning inside the server, e.g. "0 0 3 * * *".
    pub prune_cron: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            service_key: String::new(),
            image_bucket: "user-images".to_string(),
            video_bucket: "user-videos".to_string(),
            cache_control_seconds: 3600,
            request_timeout_seconds: 30,
            download_timeout_seconds: 120,
            retention_days: 7,
            prune_cron: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: usize,

    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            allowed_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of enhanced prompts kept in memory (default: 50)
    pub prompt_capacity: usize,

    /// `max-age` advertised on prompt responses (default: 300)
    pub prompt_max_age_seconds: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prompt_capacity: 50,
            prompt_max_age_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,

    pub window_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Applies to prompt enhancement and generation submits.
    pub api: RateLimitRule,

    /// Applies to image uploads.
    pub upload: RateLimitRule,

    /// How often expired windows are swept from memory.
    pub sweep_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            api: RateLimitRule {
                max_requests: 10,
                window_seconds: 60,
            },
            upload: RateLimitRule {
                max_requests: 5,
                window_seconds: 300,
            },
            sweep_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "doodlemation".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Fills credentials that the config file left empty from the environment.
    pub fn apply_env(&mut self) {
        fill_from_env(&mut self.openai.api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.replicate.api_token, "REPLICATE_API_TOKEN");
        fill_from_env(&mut self.storage.base_url, "SUPABASE_URL");
        fill_from_env(&mut self.storage.service_key, "SUPABASE_SERVICE_KEY");
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("doodlemation").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".doodlemation").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Structural checks that hold for every command.
    pub fn validate(&self) -> Result<()> {
        if self.cache.prompt_capacity == 0 {
            anyhow::bail!("cache.prompt_capacity must be > 0");
        }

        for (name, rule) in [("api", self.rate_limit.api), ("upload", self.rate_limit.upload)] {
            if rule.max_requests == 0 || rule.window_seconds == 0 {
                anyhow::bail!("rate_limit.{name} needs max_requests and window_seconds > 0");
            }
        }

        if self.rate_limit.sweep_interval_seconds == 0 {
            anyhow::bail!("rate_limit.sweep_interval_seconds must be > 0");
        }

        if self.uploads.max_bytes == 0 {
            anyhow::bail!("uploads.max_bytes must be > 0");
        }

        Ok(())
    }

    /// Checks that the external providers are configured before serving traffic.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.openai.api_key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY is not configured");
        }

        if self.replicate.api_token.is_empty() {
            anyhow::bail!("REPLICATE_API_TOKEN is not configured");
        }

        if self.storage.base_url.is_empty() || self.storage.service_key.is_empty() {
            anyhow::bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY must be configured");
        }

        Ok(())
    }
}

fn fill_from_env(target: &mut String, var: &str) {
    if target.is_empty()
        && let Ok(value) = std::env::var(var)
    {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.prompt_capacity, 50);
        assert_eq!(config.rate_limit.api.max_requests, 10);
        assert_eq!(config.rate_limit.api.window_seconds, 60);
        assert_eq!(config.rate_limit.upload.max_requests, 5);
        assert_eq!(config.rate_limit.upload.window_seconds, 300);
        assert_eq!(config.uploads.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.replicate.submission_strategy, SubmissionMode::Async);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[replicate]"));
        assert!(toml_str.contains("[rate_limit.api]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [replicate]
            submission_strategy = "sync"

            [rate_limit.upload]
            max_requests = 2
            window_seconds = 30
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.replicate.submission_strategy, SubmissionMode::Sync);
        assert_eq!(config.rate_limit.upload.max_requests, 2);

        assert_eq!(config.rate_limit.api.max_requests, 10);
        assert_eq!(config.openai.model, "gpt-5-mini");
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.rate_limit.api.max_requests = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.prompt_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_credentials() {
        let mut config = Config::default();
        assert!(config.validate_credentials().is_err());

        config.openai.api_key = "sk-test".to_string();
        config.replicate.api_token = "r8-test".to_string();
        config.storage.base_url = "https://project.supabase.co".to_string();
        config.storage.service_key = "service".to_string();
        assert!(config.validate_credentials().is_ok());
    }
}
