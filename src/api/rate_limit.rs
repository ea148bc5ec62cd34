use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::warn;

use super::ApiError;
use crate::services::RateLimiter;

/// Admits the request through `limiter` or answers 429 before the handler runs.
///
/// The peer address comes from `ConnectInfo` when the server was started with
/// it; otherwise every caller shares the `unknown` key.
pub async fn enforce(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = limiter.client_key(peer, req.headers());

    if !limiter.check(&key) {
        let retry_after_secs = limiter.retry_after_secs(&key);
        metrics::counter!("rate_limit_denied_total", "limiter" => limiter.name()).increment(1);
        warn!(
            limiter = limiter.name(),
            client = %key,
            retry_after_secs,
            "Rate limit exceeded"
        );
        return Err(ApiError::RateLimited { retry_after_secs });
    }

    Ok(next.run(req).await)
}
