//! Managed-runtime loader: process values enriched from the remote
//! store.
//!
//! Starts from the snapshot, batch-fetches the schema's remote-key
//! registry through the secret cache, and falls back per key:
//! cache/remote value, then the field's static fallback, then whatever
//! is already in process values. How an outage is handled depends on
//! [`RemotePolicy`].

use tracing::{debug, warn};

use super::RemotePolicy;
use crate::core::cache::SecretCache;
use crate::core::env::{EnvSnapshot, RawEnvironment, Source};
use crate::core::schema::Schema;
use crate::error::SourceError;

/// Load the managed-runtime environment.
///
/// # Errors
///
/// Under [`RemotePolicy::Authoritative`], returns
/// [`SourceError::RemoteAuthoritative`] naming every key the remote
/// store could not supply. Under [`RemotePolicy::BestEffort`] a store
/// failure is logged and never fatal here; a required key that ends up
/// absent everywhere surfaces later as a validation failure.
pub async fn load(
    snapshot: &EnvSnapshot,
    schema: &Schema,
    cache: &SecretCache,
    policy: RemotePolicy,
) -> Result<RawEnvironment, SourceError> {
    let mut env = RawEnvironment::from_snapshot(snapshot);

    let registry: Vec<String> = schema
        .remote_keys()
        .into_iter()
        .map(str::to_string)
        .collect();
    debug!(keys = registry.len(), "fetching remote-key registry");

    let batch = cache.get_many(&registry).await;

    if policy == RemotePolicy::Authoritative && !batch.is_complete() {
        let keys: Vec<String> = batch.failures.keys().cloned().collect();
        return Err(SourceError::RemoteAuthoritative { keys });
    }

    for spec in schema.fields().iter().filter(|spec| spec.remote) {
        if let Some(value) = batch.values.get(spec.key) {
            env.insert(spec.key, value.clone(), Source::RemoteStore);
        } else if let Some(fallback) = spec.fallback {
            warn!(key = spec.key, "remote fetch failed, using static fallback");
            env.insert(spec.key, fallback, Source::FallbackDefault);
        } else if env.get(spec.key).is_some() {
            warn!(key = spec.key, "remote fetch failed, keeping process value");
        } else {
            warn!(key = spec.key, "remote fetch failed and no fallback exists");
        }
    }

    if let Some(err) = batch.combined_error() {
        warn!(error = %err, "remote store degraded, continuing best-effort");
    }

    Ok(env)
}
