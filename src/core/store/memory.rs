//! In-memory secret store.
//!
//! Backs tests and local development. Supports per-key and whole-store
//! outage injection so degraded-store behavior can be exercised without
//! a network.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::SecretStore;
use crate::error::StoreError;

/// In-memory [`SecretStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
    outages: Mutex<BTreeSet<String>>,
    fetch_counts: Mutex<BTreeMap<String, usize>>,
    down: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with values.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (k, v) in values {
            store.insert(k, v);
        }
        store
    }

    /// Insert or replace a value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        lock(&self.values).insert(key.into(), value.into());
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) {
        lock(&self.values).remove(key);
    }

    /// Make fetches for one key fail with [`StoreError::Unavailable`].
    pub fn set_outage(&self, key: impl Into<String>) {
        lock(&self.outages).insert(key.into());
    }

    /// Clear a per-key outage.
    pub fn clear_outage(&self, key: &str) {
        lock(&self.outages).remove(key);
    }

    /// Make every fetch fail, simulating a total store outage.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Number of fetches attempted for a key, including failed ones.
    pub fn fetch_count(&self, key: &str) -> usize {
        lock(&self.fetch_counts).get(key).copied().unwrap_or(0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn fetch(&self, key: &str) -> Result<String, StoreError> {
        *lock(&self.fetch_counts).entry(key.to_string()).or_insert(0) += 1;

        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is down".to_string()));
        }
        if lock(&self.outages).contains(key) {
            return Err(StoreError::Unavailable(format!("outage injected for {key}")));
        }

        lock(&self.values)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_hit_and_miss() {
        let store = MemoryStore::with_values([("API_KEY", "sk-test-12345")]);

        assert_eq!(store.fetch("API_KEY").await.unwrap(), "sk-test-12345");
        assert_eq!(
            store.fetch("MISSING").await.unwrap_err(),
            StoreError::NotFound("MISSING".to_string())
        );
    }

    #[tokio::test]
    async fn test_outage_injection() {
        let store = MemoryStore::with_values([("API_KEY", "sk-test-12345")]);
        store.set_outage("API_KEY");

        assert!(matches!(
            store.fetch("API_KEY").await.unwrap_err(),
            StoreError::Unavailable(_)
        ));

        store.clear_outage("API_KEY");
        assert!(store.fetch("API_KEY").await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_many_collects_per_key_results() {
        let store = MemoryStore::with_values([("A", "1"), ("B", "2")]);
        store.set_outage("B");

        let keys = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let results = store.fetch_many(&keys).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["A"].as_deref(), Ok("1"));
        assert!(matches!(results["B"], Err(StoreError::Unavailable(_))));
        assert!(matches!(results["C"], Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_count_tracks_attempts() {
        let store = MemoryStore::with_values([("A", "1")]);
        assert_eq!(store.fetch_count("A"), 0);

        let _ = store.fetch("A").await;
        let _ = store.fetch("A").await;
        assert_eq!(store.fetch_count("A"), 2);
    }
}
