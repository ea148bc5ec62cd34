//! Storage prune command handler

use std::sync::Arc;

use crate::clients::{SupabaseStorage, build_http_client};
use crate::config::Config;
use crate::services::StorageService;

pub async fn cmd_prune(config: &Config, days: Option<u32>) -> anyhow::Result<()> {
    if config.storage.base_url.is_empty() || config.storage.service_key.is_empty() {
        anyhow::bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY must be set");
    }

    let days = days.unwrap_or(config.storage.retention_days);
    let http = build_http_client(config.storage.request_timeout_seconds)?;
    let store = Arc::new(SupabaseStorage::new(&config.storage, http));
    let service = StorageService::new(
        store,
        &config.storage,
        config.uploads.clone(),
        config.general.owner_key.clone(),
    );

    println!("Removing stored files older than {days} days...");

    let mut total = 0;
    for (bucket, removed) in service.prune_all(days).await? {
        println!("  {bucket}: {removed} removed");
        total += removed;
    }

    println!("✓ Prune complete ({total} files)");
    Ok(())
}
