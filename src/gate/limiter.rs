//! Fixed-window rate limiter over the shared counter store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::RateLimit;
use crate::store::{CounterStore, StoreError};

/// Margin added to the counter TTL so a counter never expires while the
/// window it belongs to is still current.
const TTL_GRACE_SECONDS: u64 = 2;

/// Outcome of a window admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request is within the window ceiling.
    Allow,
    /// Request exceeded the window ceiling.
    Deny,
}

/// How the window count behind an admission decision was obtained.
///
/// The read-increment-write fallback and the fail-open degradation are
/// deliberate, visible code paths rather than incidental error handling,
/// so tests can pin each one down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPath {
    /// First request of the window; the counter was created atomically.
    Created,
    /// Store-side atomic increment.
    Atomic(i64),
    /// Read-increment-write fallback for stores without atomic increment.
    /// May under-count by a small margin under concurrent first-burst load.
    Approximate(i64),
    /// The store was unreachable or timed out; admission assumed open.
    FailOpen,
}

/// Result of [`WindowRateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCheck {
    /// The admission decision.
    pub admission: Admission,
    /// How the decision was reached.
    pub count: CountPath,
}

impl WindowCheck {
    fn allow(count: CountPath) -> Self {
        Self {
            admission: Admission::Allow,
            count,
        }
    }
}

/// Counts requests per (identity, path) in fixed windows and enforces a
/// per-path ceiling.
///
/// Holds no per-request state of its own; every worker sharing the same
/// store and namespace enforces one global ceiling.
pub struct WindowRateLimiter<S> {
    store: Arc<S>,
    namespace: String,
}

impl<S: CounterStore> WindowRateLimiter<S> {
    /// Create a limiter writing keys under `namespace`.
    pub fn new(store: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Decide whether a request from `identity` to `path` may proceed at
    /// unix time `now`, under `limit`.
    pub async fn admit(
        &self,
        identity: &str,
        path: &str,
        limit: &RateLimit,
        now: u64,
    ) -> WindowCheck {
        // Guard against a zero-length window even if config normalization
        // was skipped upstream.
        let window_seconds = limit.window_seconds.max(1);
        let window_index = now / window_seconds;
        let key = format!(
            "{}:rl:{}:{}:{}",
            self.namespace, identity, path, window_index
        );
        let ttl = Duration::from_secs(window_seconds + TTL_GRACE_SECONDS);

        trace!(key = %key, window = window_index, "Checking window rate limit");

        match self.store.create_if_absent(&key, 1, ttl).await {
            // First request of the window.
            Ok(true) => return WindowCheck::allow(CountPath::Created),
            Ok(false) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Store error during window create, failing open");
                return WindowCheck::allow(CountPath::FailOpen);
            }
        }

        let count = match self.store.increment(&key).await {
            Ok(value) => CountPath::Atomic(value),
            Err(StoreError::IncrementUnsupported) => match self.approximate(&key, ttl).await {
                Some(value) => CountPath::Approximate(value),
                None => CountPath::FailOpen,
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Store error during window increment, failing open");
                CountPath::FailOpen
            }
        };

        let admission = match count {
            CountPath::Atomic(value) | CountPath::Approximate(value)
                if value > limit.max_requests =>
            {
                debug!(
                    key = %key,
                    count = value,
                    limit = limit.max_requests,
                    "Window rate limit exceeded"
                );
                Admission::Deny
            }
            _ => Admission::Allow,
        };

        WindowCheck { admission, count }
    }

    /// Read-increment-write fallback for stores without atomic increment.
    ///
    /// Concurrent callers can observe the same value and both write
    /// `value + 1`, under-counting by one. The race window is narrow and
    /// only ever under-counts, which is the accepted direction for a
    /// protection layer that fails open.
    async fn approximate(&self, key: &str, ttl: Duration) -> Option<i64> {
        let current = match self.store.get(key).await {
            Ok(value) => value.unwrap_or(1),
            Err(e) => {
                warn!(key = %key, error = %e, "Store error during fallback read, failing open");
                return None;
            }
        };
        let next = current + 1;
        if let Err(e) = self.store.set(key, next, Some(ttl)).await {
            warn!(key = %key, error = %e, "Store error during fallback write, failing open");
            return None;
        }
        Some(next)
    }
}
