//! Domain events for the application.
//!
//! Events are sent on the event bus and streamed to connected clients so a UI can
//! react to job progress without waiting for its next poll.

use serde::Serialize;

/// Events sent to connected clients via SSE (Server-Sent Events).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    GenerationSubmitted {
        prediction_id: String,
        status: String,
    },
    GenerationCompleted {
        prediction_id: String,
        video_url: String,
        durable: bool,
    },
    GenerationFailed {
        prediction_id: String,
        status: String,
        error: String,
    },
    GenerationSaved {
        id: String,
    },
    GenerationDeleted {
        id: String,
    },
    GenerationsCleared,
    StoragePruned {
        bucket: String,
        removed: usize,
    },
    Error {
        message: String,
    },
}
