//! Per-client rate limiting
//!
//! Token buckets keyed by client IP. Bid and offer endpoints are the ones
//! clients poll and hammer, so the whole API sits behind one limiter.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refreshed_at: Instant,
}

impl Bucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            refreshed_at: now,
        }
    }

    fn take(&mut self, now: Instant, refill_per_sec: f64, capacity: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.refreshed_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.refreshed_at = now;

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

/// Shared limiter state
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    refill_per_sec: f64,
    capacity: f64,
}

impl RateLimiter {
    /// `requests_per_second` sustained, with bursts up to twice that
    pub fn new(requests_per_second: u32) -> Self {
        let rate = requests_per_second.max(1) as f64;
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            refill_per_sec: rate,
            capacity: rate * 2.0,
        }
    }

    pub async fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(client.to_string())
            .or_insert_with(|| Bucket::full(self.capacity, now))
            .take(now, self.refill_per_sec, self.capacity)
    }

    /// Drop buckets idle for longer than `max_idle`
    pub async fn prune(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.refreshed_at) < max_idle);
        before - buckets.len()
    }
}

/// Client identity used for limiting and request logs
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}

/// Middleware rejecting clients that ran out of tokens
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string());

    if !limiter.check(&client).await {
        tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
        let mut response = ApiError::TooManyRequests.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        return response;
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_then_reject() {
        let limiter = RateLimiter::new(5);

        for _ in 0..10 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_prune_idle_buckets() {
        let limiter = RateLimiter::new(5);
        limiter.check("a").await;
        limiter.check("b").await;

        assert_eq!(limiter.prune(Duration::from_secs(3600)).await, 0);
        assert_eq!(limiter.prune(Duration::ZERO).await, 2);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "192.0.2.9".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("192.0.2.9"));

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
