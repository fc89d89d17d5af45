//! Time-to-live cache in front of the remote secret store.
//!
//! Serves cached values until expiry and degrades to a miss rather than
//! raising when the store is transiently unavailable. Expired entries
//! are treated as absent on read (lazy eviction), not proactively swept.
//!
//! Two concurrent `get` calls for the same expired key may both trigger
//! a remote fetch; both converge on the same value or the same error, so
//! no single-flight de-duplication is performed. The entry table lock is
//! never held across an await.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::core::constants::DEFAULT_TTL_SECS;
use crate::core::store::SecretStore;
use crate::error::{CacheError, StoreError};

/// One cached secret value.
///
/// The value is wiped from memory when the entry is dropped or evicted.
struct CacheEntry {
    value: Zeroizing<String>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Entry counts by current validity, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// All entries in the table, fresh or not.
    pub total: usize,
    /// Entries still within their TTL.
    pub active: usize,
    /// Entries past their TTL but not yet evicted.
    pub expired: usize,
}

/// Outcome of a batched fetch.
///
/// A partial remote failure returns the subset that succeeded plus the
/// per-key failures; failed keys are never silently dropped.
#[derive(Debug, Default)]
pub struct BatchFetch {
    /// Successfully resolved keys.
    pub values: BTreeMap<String, String>,
    /// Keys that could not be resolved, with the store's reason.
    pub failures: BTreeMap<String, StoreError>,
}

impl BatchFetch {
    /// Whether every requested key resolved.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// A combined error describing every failed key, if any failed.
    pub fn combined_error(&self) -> Option<CacheError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(CacheError::Partial {
            keys: self.failures.keys().cloned().collect(),
            detail: self
                .failures
                .values()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        })
    }
}

/// TTL cache over a [`SecretStore`].
///
/// The TTL is fixed at construction. An entry's value is only ever
/// replaced by a strictly newer fetch.
pub struct SecretCache {
    store: Arc<dyn SecretStore>,
    ttl: Duration,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl SecretCache {
    /// Create a cache with the default five-minute TTL.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self::with_ttl(store, Duration::from_secs(DEFAULT_TTL_SECS))
    }

    /// Create a cache with an explicit TTL.
    pub fn with_ttl(store: Arc<dyn SecretStore>, ttl: Duration) -> Self {
        debug!(backend = store.name(), ttl_secs = ttl.as_secs(), "creating secret cache");
        Self {
            store,
            ttl,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get one key, serving the cached value when fresh.
    ///
    /// A miss or an expired entry triggers a remote fetch whose result is
    /// cached with a fresh expiry before being returned.
    ///
    /// # Errors
    ///
    /// [`CacheError::Fetch`] wrapping the store's not-found or
    /// unavailable error.
    pub async fn get(&self, key: &str) -> Result<String, CacheError> {
        if let Some(value) = self.lookup(key) {
            trace!(key, "cache hit");
            return Ok(value);
        }

        trace!(key, "cache miss, fetching");
        let value = self
            .store
            .fetch(key)
            .await
            .map_err(|source| CacheError::Fetch {
                key: key.to_string(),
                source,
            })?;
        self.insert(key, &value);
        Ok(value)
    }

    /// Get many keys, batching the remote fetch for the ones not cached.
    ///
    /// Keys already cached are served without a remote round-trip. The
    /// underlying fetches for missing keys run concurrently.
    pub async fn get_many(&self, keys: &[String]) -> BatchFetch {
        let mut batch = BatchFetch::default();
        let mut missing = Vec::new();

        for key in keys {
            match self.lookup(key) {
                Some(value) => {
                    trace!(key = key.as_str(), "cache hit");
                    batch.values.insert(key.clone(), value);
                }
                None => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            return batch;
        }

        debug!(missing = missing.len(), "batch fetching uncached keys");
        for (key, result) in self.store.fetch_many(&missing).await {
            match result {
                Ok(value) => {
                    self.insert(&key, &value);
                    batch.values.insert(key, value);
                }
                Err(err) => {
                    warn!(key = key.as_str(), error = %err, "remote fetch failed");
                    batch.failures.insert(key, err);
                }
            }
        }

        batch
    }

    /// Remove one entry, or every entry when no key is given.
    pub fn invalidate(&self, key: Option<&str>) {
        let mut entries = self.table();
        match key {
            Some(key) => {
                entries.remove(key);
                debug!(key, "cache entry invalidated");
            }
            None => {
                entries.clear();
                debug!("cache cleared");
            }
        }
    }

    /// Count entries by current validity.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.table();

        let total = entries.len();
        let active = entries.values().filter(|e| e.is_fresh(now)).count();
        CacheStats {
            total,
            active,
            expired: total - active,
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let entries = self.table();
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| entry.value.as_str().to_string())
    }

    fn insert(&self, key: &str, value: &str) {
        let entry = CacheEntry {
            value: Zeroizing::new(value.to_string()),
            expires_at: Instant::now() + self.ttl,
        };
        self.table().insert(key.to_string(), entry);
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
