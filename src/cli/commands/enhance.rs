//! Prompt enhancement command handler

use std::sync::Arc;

use crate::clients::{OpenAiClient, build_http_client};
use crate::config::Config;
use crate::services::{PromptCache, PromptService};

pub async fn cmd_enhance(config: &Config, description: &str, details: &str) -> anyhow::Result<()> {
    if config.openai.api_key.is_empty() {
        anyhow::bail!("OPENAI_API_KEY is not set");
    }

    let http = build_http_client(config.openai.request_timeout_seconds)?;
    let client = Arc::new(OpenAiClient::new(&config.openai, http));
    let service = PromptService::new(client, Arc::new(PromptCache::new(1)), &config.openai);

    println!("Generating prompt with {}...", config.openai.model);
    let prompt = service.synthesize(description, details).await?;

    println!();
    println!("{prompt}");

    Ok(())
}
