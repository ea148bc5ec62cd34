use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;

use crate::config::RateLimitRule;

/// Derives the admission key for a request.
///
/// The default keys on the peer address. Clients behind one NAT or proxy share
/// a window; an identity-based generator can replace it once users exist.
pub trait KeyGenerator: Send + Sync {
    fn key(&self, peer: Option<SocketAddr>, headers: &HeaderMap) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PeerAddressKey;

impl KeyGenerator for PeerAddressKey {
    fn key(&self, peer: Option<SocketAddr>, _headers: &HeaderMap) -> String {
        peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
    }
}

/// Uses the first `X-Forwarded-For` hop, falling back to the peer address.
///
/// The header is client-controlled unless a proxy overwrites it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardedForKey;

impl KeyGenerator for ForwardedForKey {
    fn key(&self, peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
        headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map_or_else(|| PeerAddressKey.key(peer, headers), str::to_string)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request counter keyed by client.
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    window: Duration,
    max_requests: u32,
    windows: Arc<DashMap<String, RateWindow>>,
    key_generator: Arc<dyn KeyGenerator>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self {
            name,
            window,
            max_requests,
            windows: Arc::new(DashMap::new()),
            key_generator: Arc::new(PeerAddressKey),
        }
    }

    pub fn from_rule(name: &'static str, rule: RateLimitRule) -> Self {
        Self::new(name, rule.max_requests, Duration::from_secs(rule.window_seconds))
    }

    #[must_use]
    pub fn with_key_generator(mut self, generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = generator;
        self
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn client_key(&self, peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
        self.key_generator.key(peer, headers)
    }

    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    /// Admits or denies one request at `now`. A denial leaves the window untouched.
    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(RateWindow {
                count: 0,
                reset_at: now,
            });

        if entry.count == 0 || now > entry.reset_at {
            *entry = RateWindow {
                count: 1,
                reset_at: now + self.window,
            };
            return true;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    /// Seconds until a denied client may retry, never less than one.
    pub fn retry_after_secs(&self, key: &str) -> u64 {
        let now = Instant::now();
        self.windows
            .get(key)
            .map(|entry| entry.reset_at.saturating_duration_since(now).as_secs())
            .unwrap_or_else(|| self.window.as_secs())
            .max(1)
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Drops windows that expired before `now`. Returns how many were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at >= now);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Runs `sweep` on a fixed interval until the runtime shuts down.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(limiter = limiter.name, removed, "Swept expired rate windows");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_window_admission() {
        let limiter = RateLimiter::new("test", 3, Duration::from_secs(1));
        let start = Instant::now();

        assert!(limiter.check_at("client", start));
        assert!(limiter.check_at("client", start + Duration::from_millis(100)));
        assert!(limiter.check_at("client", start + Duration::from_millis(200)));
        assert!(!limiter.check_at("client", start + Duration::from_millis(300)));

        assert!(limiter.check_at("client", start + Duration::from_millis(1100)));
    }

    #[test]
    fn test_denial_does_not_extend_window() {
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(1));
        let start = Instant::now();

        assert!(limiter.check_at("client", start));
        for ms in [100, 500, 900, 1000] {
            assert!(!limiter.check_at("client", start + Duration::from_millis(ms)));
        }
        assert!(limiter.check_at("client", start + Duration::from_millis(1001)));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
    }

    #[test]
    fn test_sweep_removes_expired_windows() {
        let limiter = RateLimiter::new("test", 5, Duration::from_secs(1));
        let start = Instant::now();

        limiter.check_at("old", start);
        limiter.check_at("fresh", start + Duration::from_secs(2));

        let removed = limiter.sweep_at(start + Duration::from_millis(2500));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_key_generators() {
        let peer: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());

        assert_eq!(PeerAddressKey.key(Some(peer), &headers), "10.0.0.7");
        assert_eq!(PeerAddressKey.key(None, &headers), "unknown");
        assert_eq!(ForwardedForKey.key(Some(peer), &headers), "203.0.113.9");
        assert_eq!(ForwardedForKey.key(Some(peer), &HeaderMap::new()), "10.0.0.7");
    }
}
