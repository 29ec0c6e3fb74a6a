//! Request counters for `/health/metrics`

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters, updated lock-free from handlers and middleware
#[derive(Debug, Default)]
pub struct Metrics {
    extract_requests: AtomicU64,
    extractions_succeeded: AtomicU64,
    extractions_partial: AtomicU64,
    extractions_failed: AtomicU64,
    auth_failures: AtomicU64,
    rate_limited: AtomicU64,
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub extract_requests: u64,
    pub extractions_succeeded: u64,
    pub extractions_partial: u64,
    pub extractions_failed: u64,
    pub auth_failures: u64,
    pub rate_limited: u64,
}

impl Metrics {
    pub fn record_request(&self) {
        self.extract_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, partial: bool) {
        if partial {
            self.extractions_partial.fetch_add(1, Ordering::Relaxed);
        } else {
            self.extractions_succeeded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.extractions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            extract_requests: self.extract_requests.load(Ordering::Relaxed),
            extractions_succeeded: self.extractions_succeeded.load(Ordering::Relaxed),
            extractions_partial: self.extractions_partial.load(Ordering::Relaxed),
            extractions_failed: self.extractions_failed.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}
