//! In-memory rate limiting for verification work.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<Uuid, VecDeque<Instant>>`.
//! Two limits are enforced on every text-extraction request:
//! - Per-client: keyed by user id, anonymous callers share one bucket
//! - Global: across all callers, bounding concurrent OCR load
//!
//! Windows are sized from [`RateLimitConfig`]; counters live only in this
//! process and reset on restart.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::RateLimitConfig;

/// Bucket shared by unauthenticated callers.
pub const ANONYMOUS_CLIENT: Uuid = Uuid::nil();

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RateLimitError {
    #[error("per-client rate limit exceeded (max {limit} requests/{window_secs}s)")]
    PerClientExceeded { limit: usize, window_secs: u64 },
    #[error("global rate limit exceeded (max {limit} requests/{window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
}

impl crate::error::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PerClientExceeded { .. } => "E_RATE_LIMITED",
            Self::GlobalExceeded { .. } => "E_GLOBAL_RATE_LIMITED",
        }
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    per_client_limit: usize,
    per_client_window: Duration,
    global_limit: usize,
    global_window: Duration,
}

#[derive(Default)]
struct RateLimiterInner {
    client_requests: HashMap<Uuid, VecDeque<Instant>>,
    global_requests: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner::default())),
            per_client_limit: config.per_client_limit,
            per_client_window: Duration::from_secs(config.per_client_window_secs),
            global_limit: config.global_limit,
            global_window: Duration::from_secs(config.global_window_secs),
        }
    }

    /// Check both per-client and global limits, then record the request.
    /// A rejected request is not recorded.
    ///
    /// # Errors
    ///
    /// Returns the first limit that would be exceeded.
    pub fn check_and_record(&self, client_id: Uuid) -> Result<(), RateLimitError> {
        self.check_and_record_at(client_id, Instant::now())
    }

    fn check_and_record_at(&self, client_id: Uuid, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        prune_window(&mut inner.global_requests, now, self.global_window);
        if inner.global_requests.len() >= self.global_limit {
            return Err(RateLimitError::GlobalExceeded {
                limit: self.global_limit,
                window_secs: self.global_window.as_secs(),
            });
        }

        let client_deque = inner.client_requests.entry(client_id).or_default();
        prune_window(client_deque, now, self.per_client_window);
        if client_deque.len() >= self.per_client_limit {
            return Err(RateLimitError::PerClientExceeded {
                limit: self.per_client_limit,
                window_secs: self.per_client_window.as_secs(),
            });
        }

        client_deque.push_back(now);
        inner.global_requests.push_back(now);

        // Drop idle clients so the map tracks only recent callers.
        let window = self.per_client_window;
        inner
            .client_requests
            .retain(|_, deque| deque.back().is_some_and(|&last| now.duration_since(last) <= window));

        Ok(())
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
