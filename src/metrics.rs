//! Narrow metrics-sink interface.
//!
//! The gate emits a small set of decision events; where they go (Prometheus,
//! StatsD, a log line) is the embedding gateway's business.

/// Receiver for gate decision events.
///
/// Implementations must be cheap and non-blocking; the gate calls these on
/// the request path.
pub trait GateMetrics: Send + Sync {
    /// A request passed every check and was forwarded.
    fn allowed(&self) {}

    /// A request was denied by the window rate limiter.
    fn rate_limited(&self) {}

    /// A request was denied by the blocklist.
    fn blocked(&self) {}

    /// An authentication failure was recorded against an identity.
    fn auth_failure_recorded(&self) {}

    /// An identity crossed the failure threshold and entered the blocklist.
    fn identity_blocked(&self) {}

    /// A store error degraded a check to fail-open.
    fn failed_open(&self) {}
}

/// A sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl GateMetrics for NoopMetrics {}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::GateMetrics;

    /// Counts every event, for assertions in tests.
    #[derive(Debug, Default)]
    pub struct CountingMetrics {
        pub allowed: AtomicUsize,
        pub rate_limited: AtomicUsize,
        pub blocked: AtomicUsize,
        pub auth_failures: AtomicUsize,
        pub identities_blocked: AtomicUsize,
        pub fail_opens: AtomicUsize,
    }

    impl GateMetrics for CountingMetrics {
        fn allowed(&self) {
            self.allowed.fetch_add(1, Ordering::SeqCst);
        }

        fn rate_limited(&self) {
            self.rate_limited.fetch_add(1, Ordering::SeqCst);
        }

        fn blocked(&self) {
            self.blocked.fetch_add(1, Ordering::SeqCst);
        }

        fn auth_failure_recorded(&self) {
            self.auth_failures.fetch_add(1, Ordering::SeqCst);
        }

        fn identity_blocked(&self) {
            self.identities_blocked.fetch_add(1, Ordering::SeqCst);
        }

        fn failed_open(&self) {
            self.fail_opens.fetch_add(1, Ordering::SeqCst);
        }
    }
}
