//! Per-IP request rate limiting.
//!
//! Caps webhook deliveries per client IP over a sliding window. The
//! limiter sits behind a trait so a multi-instance deployment can inject a
//! shared backend; the default keeps its counters in process memory, which
//! resets on restart. That loss is accepted: the limiter exists to blunt
//! abuse, not to meter billing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// Admission decision seam for the webhook endpoint.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Whether a request from `key` may proceed right now. Counting the
    /// request is part of the call.
    async fn allow(&self, key: &str) -> bool;
}

/// In-process sliding-window limiter.
///
/// Keeps one timestamp deque per key; timestamps older than the window are
/// pruned on each call. Not durable and not shared across instances.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);

        let window = self.window;
        let entry = hits.entry(key.to_string()).or_default();
        while entry
            .front()
            .is_some_and(|hit| now.duration_since(*hit) >= window)
        {
            entry.pop_front();
        }

        if entry.len() as u32 >= self.max_requests {
            return false;
        }

        entry.push_back(now);
        true
    }
}

/// Rate limiting middleware function.
///
/// Keys on the first `x-forwarded-for` entry, falling back to "unknown"
/// when the header is absent (direct connections behind no proxy all share
/// one bucket then, which still bounds total abuse).
pub async fn enforce(
    State(limiter): State<Arc<dyn RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(request.headers());

    if !limiter.allow(&ip).await {
        tracing::warn!(%ip, "webhook rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
