/**
 * Rate Limiting Middleware
 *
 * One token bucket per client address (`"unknown"` when the address cannot
 * be resolved). A bucket holds up to `rate_limit_requests` tokens and
 * refills continuously at `rate_limit_requests / rate_limit_window`, so a
 * client may burst the whole allowance and then sustain the average rate.
 *
 * Buckets idle for a full window are back at capacity and are dropped by
 * `purge_stale`, which the server calls once per window.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

use crate::backend::auth::client_ip::request_ip;
use crate::backend::error::BackendError;

const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared per-client token buckets
#[derive(Clone, Debug)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    /// Tokens per second
    rate: f64,
    capacity: f64,
    window: Duration,
}

impl RateLimiter {
    /// Allow `requests` per `window`, with a burst of the same size.
    pub fn new(requests: u32, window: Duration) -> Self {
        let capacity = f64::from(requests.max(1));
        let window = if window.is_zero() { Duration::from_secs(1) } else { window };
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate: capacity / window.as_secs_f64(),
            capacity,
            window,
        }
    }

    /// Take a token for `client`; `false` when its bucket is empty.
    pub async fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity, now));
        bucket.try_consume(self.rate, self.capacity, now)
    }

    /// Drop buckets untouched for at least one window. Returns how many were removed.
    pub async fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < self.window);
        before - buckets.len()
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Reject requests from clients whose bucket is empty with 429.
pub async fn rate_limit(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let client = request_ip(request.headers(), request.extensions())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    if !limiter.check(&client).await {
        tracing::warn!("[RateLimit] limit exceeded for {}", client);
        return BackendError::too_many_requests().into_response();
    }

    next.run(request).await
}
