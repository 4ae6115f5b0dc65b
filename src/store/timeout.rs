//! Deadline-bounding wrapper for counter stores.

use std::time::Duration;

use async_trait::async_trait;

use super::{CounterStore, StoreError, StoreResult};

/// Wraps a [`CounterStore`] so that every call resolves within a deadline.
///
/// A slow or unreachable store must never stall the request path, so each
/// call races against `deadline` and maps elapsing into
/// [`StoreError::Timeout`]. Callers translate that into their fail-open
/// behavior; the wrapper itself takes no policy decisions.
#[derive(Debug)]
pub struct TimeoutStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S> TimeoutStore<S> {
    /// Wrap `inner`, bounding every call by `deadline`.
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    /// The configured per-call deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = StoreResult<T>> + Send,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.deadline)),
        }
    }
}

#[async_trait]
impl<S: CounterStore> CounterStore for TimeoutStore<S> {
    async fn create_if_absent(&self, key: &str, value: i64, ttl: Duration) -> StoreResult<bool> {
        self.bounded(self.inner.create_if_absent(key, value, ttl))
            .await
    }

    async fn increment(&self, key: &str) -> StoreResult<i64> {
        self.bounded(self.inner.increment(key)).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<i64>> {
        self.bounded(self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> StoreResult<()> {
        self.bounded(self.inner.set(key, value, ttl)).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.bounded(self.inner.exists(key)).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.bounded(self.inner.remove(key)).await
    }
}
