//! Auth-failure tracking and the temporary blocklist.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::FailurePolicy;
use crate::store::CounterStore;

/// What happened when an outcome was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureRecord {
    /// The outcome was not an authentication failure; nothing was touched.
    NotAFailure,
    /// The failure was counted; the identity is still below the threshold.
    Counted(i64),
    /// The failure pushed the identity onto the blocklist (or refreshed an
    /// existing block).
    Blocked(i64),
    /// The store was unreachable; the failure went unrecorded.
    Skipped,
}

/// Counts authentication failures per identity and promotes repeat
/// offenders into a TTL-bounded blocklist.
///
/// Successes never reset the failure counter. An attacker alternating
/// failures with a single success would otherwise keep restarting the
/// window and never cross the threshold; the counter expires on its own
/// instead.
pub struct AuthFailureTracker<S> {
    store: Arc<S>,
    namespace: String,
    policy: FailurePolicy,
}

impl<S: CounterStore> AuthFailureTracker<S> {
    /// Create a tracker writing keys under `namespace` with the given policy.
    pub fn new(store: Arc<S>, namespace: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            policy,
        }
    }

    fn fail_key(&self, identity: &str) -> String {
        format!("{}:fail:{}", self.namespace, identity)
    }

    fn block_key(&self, identity: &str) -> String {
        format!("{}:block:{}", self.namespace, identity)
    }

    /// Whether `identity` currently sits on the blocklist.
    ///
    /// A pure existence check with no side effects. A store error reads as
    /// not blocked: an unreachable store must never turn into a blanket
    /// denial of the protected API.
    pub async fn is_blocked(&self, identity: &str) -> bool {
        let key = self.block_key(identity);
        match self.store.exists(&key).await {
            Ok(blocked) => blocked,
            Err(e) => {
                warn!(key = %key, error = %e, "Store error during blocklist check, failing open");
                false
            }
        }
    }

    /// Record the observed outcome of a forwarded request.
    ///
    /// On an authentication failure the per-identity failure counter is
    /// created or incremented; crossing the threshold writes the block
    /// entry with the full block TTL. Re-arriving over-threshold failures
    /// refresh the block, never shorten it.
    pub async fn record_outcome(&self, identity: &str, auth_failure: bool) -> FailureRecord {
        if !auth_failure {
            return FailureRecord::NotAFailure;
        }

        let key = self.fail_key(identity);
        let window = Duration::from_secs(self.policy.window_seconds.max(1));

        let count = match self.store.create_if_absent(&key, 1, window).await {
            Ok(true) => 1,
            Ok(false) => match self.store.increment(&key).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(key = %key, error = %e, "Store error counting auth failure, skipping");
                    return FailureRecord::Skipped;
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Store error counting auth failure, skipping");
                return FailureRecord::Skipped;
            }
        };

        if count < self.policy.max_failures {
            return FailureRecord::Counted(count);
        }

        let block_key = self.block_key(identity);
        let block_ttl = Duration::from_secs(self.policy.block_seconds);
        match self.store.set(&block_key, 1, Some(block_ttl)).await {
            Ok(()) => {
                debug!(
                    identity = %identity,
                    failures = count,
                    block_seconds = self.policy.block_seconds,
                    "Identity blocked after repeated auth failures"
                );
                FailureRecord::Blocked(count)
            }
            Err(e) => {
                warn!(key = %block_key, error = %e, "Store error writing block entry");
                FailureRecord::Counted(count)
            }
        }
    }
}

impl<S> AuthFailureTracker<S> {
    /// The failure policy this tracker enforces.
    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::DownStore;
    use crate::store::MemoryStore;

    fn policy(max_failures: i64) -> FailurePolicy {
        FailurePolicy {
            window_seconds: 60,
            max_failures,
            block_seconds: 600,
        }
    }

    #[tokio::test]
    async fn test_below_threshold_is_not_blocked() {
        let store = Arc::new(MemoryStore::new());
        let tracker = AuthFailureTracker::new(Arc::clone(&store), "test", policy(3));

        assert_eq!(
            tracker.record_outcome("1.2.3.4", true).await,
            FailureRecord::Counted(1)
        );
        assert_eq!(
            tracker.record_outcome("1.2.3.4", true).await,
            FailureRecord::Counted(2)
        );
        assert!(!tracker.is_blocked("1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_threshold_blocks_identity() {
        let store = Arc::new(MemoryStore::new());
        let tracker = AuthFailureTracker::new(Arc::clone(&store), "test", policy(3));

        tracker.record_outcome("1.2.3.4", true).await;
        tracker.record_outcome("1.2.3.4", true).await;
        assert_eq!(
            tracker.record_outcome("1.2.3.4", true).await,
            FailureRecord::Blocked(3)
        );
        assert!(tracker.is_blocked("1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_over_threshold_failures_refresh_block() {
        let store = Arc::new(MemoryStore::new());
        let tracker = AuthFailureTracker::new(Arc::clone(&store), "test", policy(2));

        tracker.record_outcome("1.2.3.4", true).await;
        tracker.record_outcome("1.2.3.4", true).await;
        assert_eq!(
            tracker.record_outcome("1.2.3.4", true).await,
            FailureRecord::Blocked(3)
        );
        assert!(tracker.is_blocked("1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_success_does_not_reset_counter() {
        let store = Arc::new(MemoryStore::new());
        let tracker = AuthFailureTracker::new(Arc::clone(&store), "test", policy(3));

        tracker.record_outcome("1.2.3.4", true).await;
        tracker.record_outcome("1.2.3.4", true).await;
        assert_eq!(
            tracker.record_outcome("1.2.3.4", false).await,
            FailureRecord::NotAFailure
        );
        // The next failure continues the old count instead of restarting.
        assert_eq!(
            tracker.record_outcome("1.2.3.4", true).await,
            FailureRecord::Blocked(3)
        );
    }

    #[tokio::test]
    async fn test_success_touches_no_records() {
        let store = Arc::new(MemoryStore::new());
        let tracker = AuthFailureTracker::new(Arc::clone(&store), "test", policy(3));

        tracker.record_outcome("1.2.3.4", false).await;

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_identities_count_separately() {
        let store = Arc::new(MemoryStore::new());
        let tracker = AuthFailureTracker::new(Arc::clone(&store), "test", policy(2));

        tracker.record_outcome("1.2.3.4", true).await;
        tracker.record_outcome("5.6.7.8", true).await;

        assert!(!tracker.is_blocked("1.2.3.4").await);
        assert!(!tracker.is_blocked("5.6.7.8").await);
    }

    #[tokio::test]
    async fn test_store_failure_reads_as_not_blocked() {
        let tracker = AuthFailureTracker::new(Arc::new(DownStore), "test", policy(1));

        assert!(!tracker.is_blocked("1.2.3.4").await);
        assert_eq!(
            tracker.record_outcome("1.2.3.4", true).await,
            FailureRecord::Skipped
        );
    }

    #[tokio::test]
    async fn test_failure_window_expiry_restarts_count() {
        let store = Arc::new(MemoryStore::new());
        let tracker = AuthFailureTracker::new(
            Arc::clone(&store),
            "test",
            FailurePolicy {
                window_seconds: 1,
                max_failures: 2,
                block_seconds: 600,
            },
        );

        tracker.record_outcome("1.2.3.4", true).await;

        // Force the window record to lapse, as TTL expiry would.
        store.remove("test:fail:1.2.3.4").await.unwrap();

        assert_eq!(
            tracker.record_outcome("1.2.3.4", true).await,
            FailureRecord::Counted(1)
        );
        assert!(!tracker.is_blocked("1.2.3.4").await);
    }
}
