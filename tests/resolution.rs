//! End-to-end resolution scenarios through the facade.

mod support;

use std::sync::Arc;

use support::{local_snapshot, runtime_snapshot, seeded_resolver, seeded_store};
use wellspring::core::loader::runtime;
use wellspring::core::schema;
use wellspring::{
    DeploymentContext, EnvSnapshot, Error, MemoryStore, RemotePolicy, ResolveOptions, Resolver,
    SecretCache, Schema, Source, Stage,
};

#[tokio::test]
async fn test_managed_runtime_resolution_succeeds() {
    let (_, resolver) = seeded_resolver();

    let config = resolver
        .resolve_from(&runtime_snapshot(), &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(config.stage, Stage::Production);
    assert_eq!(config.database_url, "postgres://remote/app");
    assert_eq!(config.api_key, "sk-remote-12345");
    // PORT was never set anywhere; the schema default applies
    assert_eq!(config.port, 3000);
}

#[tokio::test]
async fn test_local_resolution_needs_no_store() {
    let tmp = tempfile::TempDir::new().unwrap();
    let resolver = Resolver::builder(Arc::new(MemoryStore::new()))
        .local_dir(tmp.path())
        .build();

    let config = resolver
        .resolve_sync_from(&local_snapshot(), &ResolveOptions::default())
        .unwrap();

    assert_eq!(config.stage, Stage::Dev);
    assert_eq!(config.database_url, "postgres://localhost/app");
}

#[tokio::test]
async fn test_local_resolution_applies_override_files() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join(".env"), "PORT=3040\n").unwrap();
    std::fs::write(tmp.path().join(".env.local"), "PORT=4000\n").unwrap();

    let resolver = Resolver::builder(Arc::new(MemoryStore::new()))
        .local_dir(tmp.path())
        .build();

    let config = resolver
        .resolve_sync_from(&local_snapshot(), &ResolveOptions::default())
        .unwrap();

    assert_eq!(config.port, 4000);
}

#[tokio::test]
async fn test_build_time_resolution_with_empty_environment() {
    let resolver = Resolver::new(Arc::new(MemoryStore::new()));
    let options = ResolveOptions::default().force_context(DeploymentContext::BuildTime);

    let config = resolver
        .resolve_sync_from(&EnvSnapshot::default(), &options)
        .unwrap();

    assert_eq!(config.port, 3000);
    assert_eq!(config.stage, Stage::Dev);
    for value in [
        &config.database_url,
        &config.api_key,
        &config.openai_key,
        &config.auth_domain,
        &config.auth_client_id,
    ] {
        assert!(
            value.starts_with("placeholder:"),
            "expected placeholder, got {value:?}"
        );
    }
}

#[tokio::test]
async fn test_validation_failure_is_fatal_and_names_fields() {
    let tmp = tempfile::TempDir::new().unwrap();
    let resolver = Resolver::builder(Arc::new(MemoryStore::new()))
        .local_dir(tmp.path())
        .build();

    // Local environment with a broken port and no auth fields
    let snapshot = EnvSnapshot::from_pairs([
        ("STAGE", "dev"),
        ("PORT", "not-a-port"),
        ("DATABASE_URL", "postgres://localhost/app"),
        ("API_KEY", "sk-local"),
        ("OPENAI_KEY", "sk-openai-local"),
    ]);

    let err = resolver
        .resolve_sync_from(&snapshot, &ResolveOptions::default())
        .unwrap_err();

    match &err {
        Error::Validation(validation) => {
            let fields: Vec<&str> = validation
                .violations
                .iter()
                .map(|v| v.field.as_str())
                .collect();
            assert!(fields.contains(&"PORT"));
            assert!(fields.contains(&"AUTH_DOMAIN"));
            assert!(fields.contains(&"AUTH_CLIENT_ID"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.stage(),
        Some(wellspring::ResolutionStage::Validate)
    );
}

#[tokio::test]
async fn test_mixed_provenance_scenario() {
    // API_KEY resolves remotely; OPENAI_KEY's store is unreachable but
    // carries a static fallback; resolution still succeeds best-effort.
    let store = seeded_store();
    store.set_outage("OPENAI_KEY");
    let cache = SecretCache::new(store.clone());

    let env = runtime::load(
        &runtime_snapshot(),
        &Schema::application(),
        &cache,
        RemotePolicy::BestEffort,
    )
    .await
    .unwrap();

    assert_eq!(env.source("API_KEY"), Some(Source::RemoteStore));
    assert_eq!(env.source("OPENAI_KEY"), Some(Source::FallbackDefault));

    let validated = schema::validate(&env, &Schema::application()).unwrap();
    let annotated =
        wellspring::core::mapper::map_annotated(&validated, &env).unwrap();
    assert_eq!(annotated.config.api_key, "sk-remote-12345");
    assert!(annotated.config.openai_key.starts_with("placeholder:"));

    // The same outage is fatal when the store is authoritative
    let resolver = Resolver::builder(store)
        .remote_policy(RemotePolicy::Authoritative)
        .build();
    let err = resolver
        .resolve_from(&runtime_snapshot(), &ResolveOptions::default())
        .await
        .unwrap_err();
    match err {
        Error::Source(source_err) => {
            assert!(source_err.to_string().contains("OPENAI_KEY"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_forced_context_skips_classification() {
    let tmp = tempfile::TempDir::new().unwrap();
    let resolver = Resolver::builder(seeded_store())
        .local_dir(tmp.path())
        .build();

    // The snapshot carries a remote-store signal, but the caller forces
    // build-time
    let snapshot = EnvSnapshot::from_pairs([("WELLSPRING_SSM_PREFIX", "/app/prod")]);
    let options = ResolveOptions::default().force_context(DeploymentContext::BuildTime);

    let (config, report) = resolver
        .resolve_with_report_from(&snapshot, &options)
        .await
        .unwrap();

    assert_eq!(report.context, DeploymentContext::BuildTime);
    assert!(config.api_key.starts_with("placeholder:"));
}

#[tokio::test]
async fn test_report_counts_by_provenance() {
    let (_, resolver) = seeded_resolver();

    let (_, report) = resolver
        .resolve_with_report_from(&runtime_snapshot(), &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(report.counts.remote_store, 3);
    assert_eq!(report.counts.environment, runtime_snapshot().len());
    assert_eq!(report.cache.active, 3);

    let json = report.to_json().unwrap();
    assert!(json.contains("\"remote_store\": 3"));
    // Secret values never appear in the report
    assert!(!json.contains("sk-remote-12345"));
}

#[tokio::test]
async fn test_logging_enabled_does_not_change_result() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("wellspring=debug")
        .try_init();

    let (_, resolver) = seeded_resolver();
    let quiet = resolver
        .resolve_from(&runtime_snapshot(), &ResolveOptions::default())
        .await
        .unwrap();

    resolver.reset();
    let logged = resolver
        .resolve_from(&runtime_snapshot(), &ResolveOptions::default().log_stages())
        .await
        .unwrap();

    assert_eq!(*quiet, *logged);
}
