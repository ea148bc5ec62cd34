pub mod prompt_cache;
pub use prompt_cache::PromptCache;

pub mod rate_limiter;
pub use rate_limiter::{ForwardedForKey, KeyGenerator, PeerAddressKey, RateLimiter};

pub mod prompt_service;
pub use prompt_service::{EnhancedPrompt, PromptError, PromptService};

pub mod submission;
pub use submission::{
    AsyncSubmission, GenerationRequest, SubmissionError, SubmissionStrategy, SyncSubmission,
};

pub mod status_tracker;
pub use status_tracker::{StatusCheckError, StatusTracker};

pub mod materializer;
pub use materializer::{MaterializeError, Materializer};

pub mod storage_service;
pub use storage_service::{StorageError, StorageService, UploadedImage};

pub mod generation_service;
pub use generation_service::{
    GenerationError, GenerationService, ReportStatus, StatusReport, SubmitOutcome,
};

pub mod scheduler;
pub use scheduler::Scheduler;
