//! In-process counter store backed by a concurrent map.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CounterStore, StoreResult};

/// A stored value with an optional expiry deadline.
#[derive(Debug, Clone, Copy)]
struct Record {
    value: i64,
    expires_at: Option<Instant>,
}

impl Record {
    fn expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}

/// An in-process [`CounterStore`] backed by a `DashMap`.
///
/// Suitable for single-process deployments and tests. Expiry is lazy: a
/// record past its deadline is treated as absent and overwritten or dropped
/// on the next access, which preserves the TTL-only deletion model without a
/// background sweeper.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Record>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) records, primarily for tests.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.records.iter().filter(|r| !r.expired(now)).count()
    }

    /// Whether the store holds no live records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deadline(ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|t| Instant::now() + t)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn create_if_absent(&self, key: &str, value: i64, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut created = false;
        let mut entry = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| {
                created = true;
                Record {
                    value,
                    expires_at: Self::deadline(Some(ttl)),
                }
            });
        if !created && entry.expired(now) {
            // Expired record counts as absent.
            *entry = Record {
                value,
                expires_at: Self::deadline(Some(ttl)),
            };
            created = true;
        }
        Ok(created)
    }

    async fn increment(&self, key: &str) -> StoreResult<i64> {
        let now = Instant::now();
        let mut entry = self.records.entry(key.to_string()).or_insert(Record {
            value: 0,
            expires_at: None,
        });
        if entry.expired(now) {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.value += 1;
        Ok(entry.value)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<i64>> {
        let now = Instant::now();
        Ok(self
            .records
            .get(key)
            .filter(|r| !r.expired(now))
            .map(|r| r.value))
    }

    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> StoreResult<()> {
        self.records.insert(
            key.to_string(),
            Record {
                value,
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .records
            .get(key)
            .map(|r| !r.expired(now))
            .unwrap_or(false))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_if_absent_first_wins() {
        let store = MemoryStore::new();

        assert!(store
            .create_if_absent("k", 1, Duration::from_secs(10))
            .await
            .unwrap());
        assert!(!store
            .create_if_absent("k", 5, Duration::from_secs(10))
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_increment_returns_new_value() {
        let store = MemoryStore::new();

        store
            .create_if_absent("k", 1, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.increment("k").await.unwrap(), 2);
        assert_eq!(store.increment("k").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_absent() {
        let store = MemoryStore::new();

        store
            .set("k", 7, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(store.exists("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!store.exists("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_if_absent_replaces_expired_record() {
        let store = MemoryStore::new();

        store
            .set("k", 99, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store
            .create_if_absent("k", 1, Duration::from_secs(10))
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_remove_deletes_record() {
        let store = MemoryStore::new();

        store.set("k", 1, None).await.unwrap();
        store.remove("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_exact() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    store.increment("k").await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("k").await.unwrap(), Some(800));
    }
}
