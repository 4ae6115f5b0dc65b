//! Gate orchestration: the per-request decision pipeline.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::GateConfig;
use crate::metrics::{GateMetrics, NoopMetrics};
use crate::request::{DenyReason, GateResponse, RequestContext};
use crate::store::CounterStore;

use super::limiter::{Admission, CountPath, WindowRateLimiter};
use super::policy::PolicyController;
use super::tracker::{AuthFailureTracker, FailureRecord};

/// Trait for the protected handler behind the gate.
///
/// The embedding gateway implements this over whatever its route handlers
/// look like; the gate only ever sees the status-code class of the result.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle a request and produce a response.
    async fn handle(&self, request: &RequestContext) -> GateResponse;
}

/// The composed abuse-protection middleware.
///
/// Runs every inbound request through the policy check, the blocklist
/// check, and the window rate limiter, forwards it to the protected
/// handler when all of them pass, and feeds the observed outcome back into
/// the auth-failure tracker. Exactly one terminal outcome is reached per
/// request: blocked, rate-limited, or the handler's own response.
pub struct Gate<S> {
    policy: PolicyController<S>,
    limiter: WindowRateLimiter<S>,
    tracker: AuthFailureTracker<S>,
    metrics: Arc<dyn GateMetrics>,
}

impl<S: CounterStore> Gate<S> {
    /// Create a gate over `store` with the given configuration.
    ///
    /// A networked store should be handed in wrapped in a
    /// [`crate::store::TimeoutStore`] so every call on the request path is
    /// deadline-bounded. The key namespace is fixed at construction;
    /// runtime config updates through [`Gate::policy`] affect the
    /// policy-level knobs only.
    pub fn new(store: Arc<S>, config: GateConfig) -> Self {
        let namespace = config.namespace.clone();
        let failure = config.failure;
        Self {
            limiter: WindowRateLimiter::new(Arc::clone(&store), namespace.clone()),
            tracker: AuthFailureTracker::new(Arc::clone(&store), namespace, failure),
            policy: PolicyController::new(store, config),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Attach a metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn GateMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The policy controller, for runtime configuration updates.
    pub fn policy(&self) -> &PolicyController<S> {
        &self.policy
    }

    /// Run `request` through the gate at the current time.
    pub async fn handle<H: Handler + ?Sized>(
        &self,
        request: &RequestContext,
        handler: &H,
    ) -> GateResponse {
        self.handle_at(request, handler, unix_now()).await
    }

    /// Run `request` through the gate at unix time `now`.
    #[instrument(skip(self, request, handler), fields(method = %request.method, path = %request.path))]
    pub async fn handle_at<H: Handler + ?Sized>(
        &self,
        request: &RequestContext,
        handler: &H,
        now: u64,
    ) -> GateResponse {
        // PolicyCheck: disabled, unprotected, or allowlisted requests
        // bypass every check and every piece of bookkeeping. The two
        // in-memory checks run first so an allowlisted or unprotected
        // request never touches the store at all.
        if !self.policy.is_protected(&request.path) {
            return handler.handle(request).await;
        }
        let identity = request.client_identity();
        if self.policy.is_allowlisted(&identity) {
            return handler.handle(request).await;
        }
        if !self.policy.is_enabled().await {
            return handler.handle(request).await;
        }

        // BlockCheck: a blocked identity short-circuits before the handler
        // and before any counter is touched.
        if self.tracker.is_blocked(&identity).await {
            debug!(identity = %identity, "Request refused: identity on blocklist");
            self.metrics.blocked();
            return GateResponse::deny(
                self.policy.block_status(),
                DenyReason::Blocklist,
                &request.path,
            );
        }

        // RateCheck.
        let limit = self.policy.limit_for(&request.path);
        let check = self.limiter.admit(&identity, &request.path, &limit, now).await;
        if check.count == CountPath::FailOpen {
            self.metrics.failed_open();
        }
        if check.admission == Admission::Deny {
            self.metrics.rate_limited();
            return GateResponse::deny(
                self.policy.block_status(),
                DenyReason::RateLimit,
                &request.path,
            );
        }

        // Forward, then inspect the response for auth-failure bookkeeping.
        let response = handler.handle(request).await;
        match self
            .tracker
            .record_outcome(&identity, response.is_auth_failure())
            .await
        {
            FailureRecord::Counted(_) => self.metrics.auth_failure_recorded(),
            FailureRecord::Blocked(_) => {
                self.metrics.auth_failure_recorded();
                self.metrics.identity_blocked();
            }
            FailureRecord::NotAFailure | FailureRecord::Skipped => {}
        }
        self.metrics.allowed();
        response
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
