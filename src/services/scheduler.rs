use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::domain::events::NotificationEvent;
use crate::services::generation_service::PENDING_TTL;
use crate::services::{GenerationService, RateLimiter, StorageService};

/// Background housekeeping: rate window and pending job sweeps, and optional
/// storage pruning.
pub struct Scheduler {
    limiters: Vec<RateLimiter>,
    generations: Arc<GenerationService>,
    sweep_every: Duration,
    storage: Arc<StorageService>,
    prune_cron: Option<String>,
    retention_days: u32,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        limiters: Vec<RateLimiter>,
        generations: Arc<GenerationService>,
        sweep_every: Duration,
        storage: Arc<StorageService>,
        prune_cron: Option<String>,
        retention_days: u32,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            limiters,
            generations,
            sweep_every,
            storage,
            prune_cron,
            retention_days,
            event_bus,
        }
    }

    /// Spawns the sweepers and, when configured, registers the prune job.
    /// The returned scheduler must be kept alive for the cron job to run.
    pub async fn start(&self) -> Result<Option<JobScheduler>> {
        for limiter in &self.limiters {
            limiter.spawn_sweeper(self.sweep_every);
        }
        info!(
            limiters = self.limiters.len(),
            every_secs = self.sweep_every.as_secs(),
            "Rate limit sweepers started"
        );
        self.generations.spawn_sweeper(self.sweep_every, PENDING_TTL);

        let Some(cron_expr) = self.prune_cron.as_deref() else {
            return Ok(None);
        };

        let sched = JobScheduler::new().await?;
        let storage = Arc::clone(&self.storage);
        let event_bus = self.event_bus.clone();
        let days = self.retention_days;

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let storage = Arc::clone(&storage);
            let event_bus = event_bus.clone();
            Box::pin(async move {
                let start = std::time::Instant::now();
                info!(event = "job_started", job_name = "prune_storage", "Starting scheduled storage prune");

                match storage.prune_all(days).await {
                    Ok(results) => {
                        for (bucket, removed) in results {
                            let _ = event_bus.send(NotificationEvent::StoragePruned { bucket, removed });
                        }
                    }
                    Err(e) => {
                        error!(event = "job_failed", job_name = "prune_storage", error = %e, "Scheduled storage prune failed");
                    }
                }

                info!(
                    event = "job_finished",
                    job_name = "prune_storage",
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Scheduled storage prune finished"
                );
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;
        info!(cron = %cron_expr, retention_days = days, "Storage prune scheduled");

        Ok(Some(sched))
    }
}
