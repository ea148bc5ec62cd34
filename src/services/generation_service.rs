//! Orchestrates a generation job from submission to a durable video.
//!
//! The provider owns job state. This service only remembers what was asked for
//! (so a finished job can be saved with its prompt and image) and the final
//! report of terminal jobs that were not saved, so every later poll gets the
//! same answer. Saved jobs are answered from the database.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{OnceCell, broadcast};
use tracing::{debug, info, warn};

use crate::db::{NewGeneration, Store};
use crate::domain::events::NotificationEvent;
use crate::domain::{JobHandle, JobId, JobState, JobStatus, VIDEO_MODEL};
use crate::services::materializer::Materializer;
use crate::services::status_tracker::{StatusCheckError, StatusTracker};
use crate::services::submission::{GenerationRequest, SubmissionError, SubmissionStrategy};

pub const STORAGE_FALLBACK_WARNING: &str = "Failed to upload to storage, using original URL";
pub const MISSING_OUTPUT_MESSAGE: &str = "Video generation succeeded but returned no video URL";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    StatusCheck(#[from] StatusCheckError),

    #[error("Database error: {0}")]
    Database(String),
}

/// Status reported to clients. `Error` marks a job the provider called
/// successful but which produced nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Error,
}

impl From<JobStatus> for ReportStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued => Self::Queued,
            JobStatus::Processing => Self::Processing,
            JobStatus::Succeeded => Self::Succeeded,
            JobStatus::Failed => Self::Failed,
            JobStatus::Canceled => Self::Canceled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub job_id: JobId,
    pub status: ReportStatus,
    pub video_url: Option<String>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl StatusReport {
    fn new(job_id: &JobId, status: ReportStatus) -> Self {
        Self {
            job_id: job_id.clone(),
            status,
            video_url: None,
            error: None,
            warning: None,
        }
    }

    fn succeeded(job_id: &JobId, video_url: String, warning: Option<&str>) -> Self {
        Self {
            video_url: Some(video_url),
            warning: warning.map(str::to_string),
            ..Self::new(job_id, ReportStatus::Succeeded)
        }
    }

    fn failed(job_id: &JobId, status: ReportStatus, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(job_id, status)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub handle: JobHandle,
    /// Set only when the job already finished during submission.
    pub video_url: Option<String>,
    pub warning: Option<String>,
}

/// Terminal reports kept for jobs whose result was not saved to the database.
const FINISHED_REPORT_CAPACITY: usize = 1024;

/// Submitted jobs nobody polls to a terminal state are forgotten after this.
pub const PENDING_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct PendingJob {
    request: GenerationRequest,
    submitted_at: Instant,
}

pub struct GenerationService {
    submitter: Arc<dyn SubmissionStrategy>,
    tracker: StatusTracker,
    materializer: Materializer,
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
    owner_key: String,
    pending: DashMap<JobId, PendingJob>,
    /// One cell per job currently being finished, shared by concurrent pollers.
    in_flight: DashMap<JobId, Arc<OnceCell<StatusReport>>>,
    finished: Mutex<LruCache<JobId, StatusReport>>,
}

impl GenerationService {
    #[must_use]
    pub fn new(
        submitter: Arc<dyn SubmissionStrategy>,
        tracker: StatusTracker,
        materializer: Materializer,
        store: Store,
        event_bus: broadcast::Sender<NotificationEvent>,
        owner_key: impl Into<String>,
    ) -> Self {
        let capacity = NonZeroUsize::new(FINISHED_REPORT_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            submitter,
            tracker,
            materializer,
            store,
            event_bus,
            owner_key: owner_key.into(),
            pending: DashMap::new(),
            in_flight: DashMap::new(),
            finished: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn submit(&self, request: GenerationRequest) -> Result<SubmitOutcome, GenerationError> {
        let handle = self.submitter.submit(&request).await?;

        metrics::counter!("generation_jobs_submitted_total").increment(1);
        info!(
            job_id = %handle.job_id,
            status = %handle.status,
            duration = request.parameters.duration.seconds(),
            resolution = %request.parameters.resolution,
            "Generation submitted"
        );
        self.publish(NotificationEvent::GenerationSubmitted {
            prediction_id: handle.job_id.to_string(),
            status: handle.status.to_string(),
        });

        let Some(remote_url) = handle.result_url.clone() else {
            self.pending.insert(
                handle.job_id.clone(),
                PendingJob {
                    request,
                    submitted_at: Instant::now(),
                },
            );
            return Ok(SubmitOutcome {
                handle,
                video_url: None,
                warning: None,
            });
        };

        // The synthetic id is shared by every blocking submission, so it is not
        // recorded as the prediction id.
        let (report, _) = self.complete(&handle.job_id, remote_url, Some(request), false).await;
        Ok(SubmitOutcome {
            handle,
            video_url: report.video_url,
            warning: report.warning,
        })
    }

    /// Current status of a job. Terminal answers are computed once and then
    /// repeated verbatim.
    pub async fn check_status(&self, job_id: &JobId) -> Result<StatusReport, GenerationError> {
        if let Some(report) = self.lookup_finished(job_id).await? {
            return Ok(report);
        }

        let state = self.tracker.poll(job_id).await?;
        if let JobState::InProgress(status) = state {
            return Ok(StatusReport::new(job_id, status.into()));
        }

        let cell = self.in_flight.entry(job_id.clone()).or_default().clone();
        let report = cell
            .get_or_try_init(|| self.finish(job_id, state))
            .await?
            .clone();
        self.in_flight.remove_if(job_id, |_, current| Arc::ptr_eq(current, &cell));

        Ok(report)
    }

    /// Number of submitted jobs that have not reached a terminal state yet.
    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    /// Number of terminal reports held in memory.
    pub fn remembered_reports(&self) -> usize {
        self.lock_finished().len()
    }

    /// Forgets submissions older than `max_age` and finishing cells nobody
    /// awaits any more. Returns how many submissions were dropped.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, job| job.submitted_at.elapsed() < max_age);
        self.in_flight.retain(|_, cell| Arc::strong_count(cell) > 1);
        before.saturating_sub(self.pending.len())
    }

    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        max_age: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = service.sweep(max_age);
                if removed > 0 {
                    debug!(removed, "Forgot stale pending generations");
                }
            }
        })
    }

    /// A terminal answer that needs no provider call: one remembered in
    /// memory, or a generation saved under this prediction id.
    async fn lookup_finished(&self, job_id: &JobId) -> Result<Option<StatusReport>, GenerationError> {
        let remembered = self.lock_finished().get(job_id).cloned();
        if remembered.is_some() {
            return Ok(remembered);
        }

        let saved = self
            .store
            .find_generation_by_prediction(job_id.as_str())
            .await
            .map_err(|e| GenerationError::Database(e.to_string()))?;

        Ok(saved.map(|saved| StatusReport::succeeded(job_id, saved.video_url, None)))
    }

    /// Runs once per terminal job. The request stays registered until the
    /// outcome is settled, so an abandoned attempt can be repeated in full.
    async fn finish(&self, job_id: &JobId, state: JobState) -> Result<StatusReport, GenerationError> {
        // Another poller may have finished the job between our lookup and now.
        if let Some(report) = self.lookup_finished(job_id).await? {
            return Ok(report);
        }

        let request = self.pending.get(job_id).map(|job| job.request.clone());

        let (report, saved) = match state {
            JobState::Succeeded { result_url } => {
                self.complete(job_id, result_url, request, true).await
            }
            JobState::Failed { status, message } => {
                metrics::counter!("generation_jobs_completed_total", "outcome" => status.as_str())
                    .increment(1);
                warn!(job_id = %job_id, status = %status, error = %message, "Generation failed");
                self.publish(NotificationEvent::GenerationFailed {
                    prediction_id: job_id.to_string(),
                    status: status.to_string(),
                    error: message.clone(),
                });
                (StatusReport::failed(job_id, status.into(), message), false)
            }
            JobState::MissingOutput => {
                metrics::counter!("generation_jobs_completed_total", "outcome" => "missing_output")
                    .increment(1);
                warn!(job_id = %job_id, "Generation succeeded without an output");
                self.publish(NotificationEvent::GenerationFailed {
                    prediction_id: job_id.to_string(),
                    status: "error".to_string(),
                    error: MISSING_OUTPUT_MESSAGE.to_string(),
                });
                let report =
                    StatusReport::failed(job_id, ReportStatus::Error, MISSING_OUTPUT_MESSAGE.to_string());
                (report, false)
            }
            JobState::InProgress(status) => return Ok(StatusReport::new(job_id, status.into())),
        };

        self.pending.remove(job_id);
        if !saved {
            self.lock_finished().put(job_id.clone(), report.clone());
        }

        Ok(report)
    }

    /// Moves the artifact to storage and saves the record when the request is
    /// known. Falls back to the provider URL if the move fails. The flag tells
    /// whether a record was saved.
    async fn complete(
        &self,
        job_id: &JobId,
        remote_url: String,
        request: Option<GenerationRequest>,
        record_prediction: bool,
    ) -> (StatusReport, bool) {
        let durable_url = match self.materializer.materialize(&remote_url, &self.owner_key).await {
            Ok(url) => url,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Keeping provider URL");
                metrics::counter!("generation_jobs_completed_total", "outcome" => "succeeded_remote")
                    .increment(1);
                self.publish(NotificationEvent::GenerationCompleted {
                    prediction_id: job_id.to_string(),
                    video_url: remote_url.clone(),
                    durable: false,
                });
                let report =
                    StatusReport::succeeded(job_id, remote_url, Some(STORAGE_FALLBACK_WARNING));
                return (report, false);
            }
        };

        metrics::counter!("generation_jobs_completed_total", "outcome" => "succeeded").increment(1);
        info!(job_id = %job_id, video_url = %durable_url, "Generation completed");

        let saved = match request {
            Some(request) => {
                let prediction_id = record_prediction.then(|| job_id.to_string());
                self.persist(request, &durable_url, prediction_id).await
            }
            None => false,
        };

        self.publish(NotificationEvent::GenerationCompleted {
            prediction_id: job_id.to_string(),
            video_url: durable_url.clone(),
            durable: true,
        });

        (StatusReport::succeeded(job_id, durable_url, None), saved)
    }

    async fn persist(
        &self,
        request: GenerationRequest,
        video_url: &str,
        prediction_id: Option<String>,
    ) -> bool {
        let record = NewGeneration {
            prediction_id,
            image_url: request.image_url,
            video_url: video_url.to_string(),
            prompt: request.prompt,
            model: Some(VIDEO_MODEL.to_string()),
            duration: Some(i32::from(request.parameters.duration.seconds())),
            resolution: Some(request.parameters.resolution.to_string()),
            ..NewGeneration::default()
        };

        match self.store.add_generation(record).await {
            Ok(saved) => {
                self.publish(NotificationEvent::GenerationSaved { id: saved.id });
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save generation record");
                false
            }
        }
    }

    fn lock_finished(&self) -> MutexGuard<'_, LruCache<JobId, StatusReport>> {
        match self.finished.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Recovered from poisoned finished report lock");
                poisoned.into_inner()
            }
        }
    }

    fn publish(&self, event: NotificationEvent) {
        // No subscribers is normal when nobody has the page open.
        let _ = self.event_bus.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ReportStatus::Error).unwrap(),
            "\"error\""
        );
        assert_eq!(
            ReportStatus::from(JobStatus::Canceled),
            ReportStatus::Canceled
        );
    }

    #[test]
    fn test_report_constructors() {
        let id = JobId::new("p1");
        let report = StatusReport::succeeded(&id, "https://v/x.mp4".to_string(), Some(STORAGE_FALLBACK_WARNING));
        assert_eq!(report.status, ReportStatus::Succeeded);
        assert_eq!(report.warning.as_deref(), Some(STORAGE_FALLBACK_WARNING));
        assert!(report.error.is_none());

        let report = StatusReport::failed(&id, ReportStatus::Failed, "boom".to_string());
        assert_eq!(report.error.as_deref(), Some("boom"));
        assert!(report.video_url.is_none());
    }
}
