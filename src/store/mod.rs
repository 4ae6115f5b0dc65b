//! Shared counter store abstraction.
//!
//! All cross-request coordination happens through a counter store that every
//! worker process can reach (typically a networked cache such as Redis or
//! memcached). The gate never holds cross-request mutable state of its own,
//! so correctness under concurrency rests entirely on the store's atomic
//! primitives: create-if-absent, increment, and set-with-expiry.

mod memory;
mod timeout;

pub use memory::MemoryStore;
pub use timeout::TimeoutStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a counter store call.
///
/// The gate never surfaces these to the caller of a protected route. Every
/// consumer of the store decides its own degraded behavior (fail open for
/// admission checks, skip for bookkeeping writes).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The call exceeded its deadline.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store could not be reached or returned a transport-level error.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store has no atomic increment primitive.
    ///
    /// Callers that can tolerate a narrow race fall back to
    /// read-increment-write when they see this.
    #[error("atomic increment not supported by this store")]
    IncrementUnsupported,
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{CounterStore, StoreError, StoreResult};

    /// A store that fails every call, for exercising fail-open paths.
    pub struct DownStore;

    impl DownStore {
        fn err<T>() -> StoreResult<T> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl CounterStore for DownStore {
        async fn create_if_absent(&self, _: &str, _: i64, _: Duration) -> StoreResult<bool> {
            Self::err()
        }

        async fn increment(&self, _: &str) -> StoreResult<i64> {
            Self::err()
        }

        async fn get(&self, _: &str) -> StoreResult<Option<i64>> {
            Self::err()
        }

        async fn set(&self, _: &str, _: i64, _: Option<Duration>) -> StoreResult<()> {
            Self::err()
        }

        async fn exists(&self, _: &str) -> StoreResult<bool> {
            Self::err()
        }

        async fn remove(&self, _: &str) -> StoreResult<()> {
            Self::err()
        }
    }
}

/// Trait for shared counter store implementations.
///
/// Implementations must be safe under arbitrary concurrent callers across
/// processes; records expire by TTL only, so no caller ever needs to run
/// cleanup. `remove` exists solely as the administrative unblock hook and is
/// never called on the request path.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically create `key` with `value` and the given TTL.
    ///
    /// Returns `true` if the key was created, `false` if it already existed.
    async fn create_if_absent(&self, key: &str, value: i64, ttl: Duration) -> StoreResult<bool>;

    /// Atomically increment `key` by one and return the new value.
    async fn increment(&self, key: &str) -> StoreResult<i64>;

    /// Read the current value of `key`, if present and unexpired.
    async fn get(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Unconditionally set `key` to `value`. A `None` TTL means no expiry.
    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> StoreResult<()>;

    /// Check whether `key` is present and unexpired.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Delete `key` if present.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}
