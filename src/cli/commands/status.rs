//! Job status command handler

use std::sync::Arc;

use crate::clients::{ReplicateClient, build_http_client};
use crate::config::Config;
use crate::domain::{JobId, JobState};
use crate::services::StatusTracker;

pub async fn cmd_status(config: &Config, job_id: &str) -> anyhow::Result<()> {
    if config.replicate.api_token.is_empty() {
        anyhow::bail!("REPLICATE_API_TOKEN is not set");
    }

    let http = build_http_client(config.replicate.request_timeout_seconds)?;
    let tracker = StatusTracker::new(Arc::new(ReplicateClient::new(&config.replicate, http)));

    let job_id = JobId::new(job_id.trim());
    let state = tracker.poll(&job_id).await?;

    println!("Job {job_id}");
    println!("{:-<60}", "");
    println!("  Status: {}", state.status());

    match state {
        JobState::InProgress(_) => println!("  Still running, check again shortly."),
        JobState::Succeeded { result_url } => println!("  Video: {result_url}"),
        JobState::Failed { message, .. } => println!("  Error: {message}"),
        JobState::MissingOutput => println!("  Finished without a video URL."),
    }

    Ok(())
}
