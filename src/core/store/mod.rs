//! Remote secret/parameter store backends.
//!
//! The resolution engine only depends on the minimal [`SecretStore`]
//! contract: get one key, get many keys, each returning either a string
//! value or a structured not-found/unavailable error.
//!
//! ## Backends
//!
//! - **memory**: Always available. In-memory map with failure injection,
//!   used by tests and local development.
//! - **AWS SSM**: Feature-gated (`aws`). Uses AWS Systems Manager
//!   Parameter Store.
//!
//! ## Adding a New Backend
//!
//! 1. Implement the `SecretStore` trait
//! 2. Add the implementation in a new file (e.g., `vault.rs`)
//! 3. Feature-gate if it pulls in an SDK
//! 4. Re-export from this module

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::StoreError;

mod memory;

#[cfg(feature = "aws")]
pub mod aws;

pub use memory::MemoryStore;

/// Remote secret/parameter store contract.
///
/// Timeouts are the implementing client's responsibility; a client-level
/// timeout must surface as [`StoreError::Unavailable`] so the cache can
/// treat it as an ordinary fetch failure.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a single key.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the store reports the key absent,
    /// [`StoreError::Unavailable`] when the store cannot be reached.
    async fn fetch(&self, key: &str) -> Result<String, StoreError>;

    /// Fetch many keys, reporting success or failure per key.
    ///
    /// The default implementation issues concurrent single-key fetches;
    /// backends with a native batch operation should override it. No
    /// ordering is guaranteed between the underlying requests, only that
    /// every key's outcome is collected before returning.
    async fn fetch_many(&self, keys: &[String]) -> BTreeMap<String, Result<String, StoreError>> {
        let fetches = keys.iter().map(|key| async move {
            let result = self.fetch(key).await;
            (key.clone(), result)
        });
        join_all(fetches).await.into_iter().collect()
    }

    /// Backend name for display/config.
    fn name(&self) -> &'static str;
}
