//! Fixed-window rate limiting per API key
//!
//! Each client gets `limit` requests per window. The window starts with the
//! client's first request and resets once it has elapsed.

use crate::{auth::ClientKey, ApiError, ApiState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Outcome of one rate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-client request counter
#[derive(Debug)]
pub struct RateLimiter {
    /// Requests per window; 0 disables limiting
    limit: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request for `client` now
    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Count one request for `client` at `now`
    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        if self.limit == 0 {
            return RateDecision::Allowed {
                remaining: u32::MAX,
            };
        }

        // A poisoned lock only means another request panicked mid-update
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Drop expired windows so the map does not grow without bound
        if clients.len() > 1024 {
            let window = self.window;
            clients.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.limit {
            let elapsed = now.saturating_duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed).max(Duration::from_secs(1));
            return RateDecision::Limited { retry_after };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.limit - entry.count,
        }
    }
}

/// Enforce the limiter for the authenticated client.
pub async fn enforce_rate_limit(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = request
        .extensions()
        .get::<ClientKey>()
        .map_or_else(|| "anonymous".to_string(), |k| k.0.clone());

    match state.rate_limiter.check(&client) {
        RateDecision::Allowed { .. } => Ok(next.run(request).await),
        RateDecision::Limited { retry_after } => {
            warn!(
                "Rate limit exceeded for key {}",
                crate::auth::key_prefix(&client)
            );
            state.metrics.record_rate_limited();
            Err(ApiError::RateLimited {
                limit: state.rate_limiter.limit(),
                window_secs: state.rate_limiter.window().as_secs(),
                retry_after_secs: retry_after.as_secs().max(1),
            })
        }
    }
}
