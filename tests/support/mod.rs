//! Test support utilities for wellspring integration tests.
//!
//! Provides reusable snapshots, seeded stores, and resolver setup.

#![allow(dead_code)]

use std::sync::Arc;

use wellspring::{EnvSnapshot, MemoryStore, Resolver};

/// Standard remote secrets used across multiple tests.
pub const REMOTE_SECRETS: &[(&str, &str)] = &[
    ("DATABASE_URL", "postgres://remote/app"),
    ("API_KEY", "sk-remote-12345"),
    ("OPENAI_KEY", "sk-openai-67890"),
];

/// Non-secret values a managed runtime would carry in its environment.
pub const RUNTIME_ENV: &[(&str, &str)] = &[
    ("WELLSPRING_SSM_PREFIX", "/app/prod"),
    ("STAGE", "production"),
    ("AUTH_DOMAIN", "example.auth0.com"),
    ("AUTH_CLIENT_ID", "client-abc"),
];

/// A complete local-development environment, no remote store involved.
pub const LOCAL_ENV: &[(&str, &str)] = &[
    ("STAGE", "dev"),
    ("DATABASE_URL", "postgres://localhost/app"),
    ("API_KEY", "sk-local-12345"),
    ("OPENAI_KEY", "sk-openai-local"),
    ("AUTH_DOMAIN", "example.auth0.com"),
    ("AUTH_CLIENT_ID", "client-abc"),
];

/// Snapshot of a managed-runtime process environment.
pub fn runtime_snapshot() -> EnvSnapshot {
    EnvSnapshot::from_pairs(RUNTIME_ENV.iter().copied())
}

/// Snapshot of a local-development process environment.
pub fn local_snapshot() -> EnvSnapshot {
    EnvSnapshot::from_pairs(LOCAL_ENV.iter().copied())
}

/// A store seeded with the standard remote secrets.
pub fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_values(REMOTE_SECRETS.iter().copied()))
}

/// A resolver over a seeded store.
pub fn seeded_resolver() -> (Arc<MemoryStore>, Resolver) {
    let store = seeded_store();
    (store.clone(), Resolver::new(store))
}
