use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::domain::events::NotificationEvent;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// `GET /api/events`
///
/// Streams every [`NotificationEvent`] published after the client connected.
pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_bus().subscribe();
    debug!(subscribers = state.event_bus().receiver_count(), "Event stream opened");

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match to_sse(&event) {
                    Some(sse) => return Some((Ok(sse), rx)),
                    None => continue,
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(missed = count, "Event stream client lagged");
                    let sse = Event::default().event("warning").data("Missed some events");
                    return Some((Ok(sse), rx));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE))
}

fn to_sse(event: &NotificationEvent) -> Option<Event> {
    Event::default()
        .json_data(event)
        .inspect_err(|e| warn!(error = %e, "Failed to encode notification"))
        .ok()
}
