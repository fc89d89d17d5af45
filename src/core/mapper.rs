//! Mapping from validated configuration to the application-facing shape.
//!
//! The mapper is the single place external field names become the names
//! the rest of the system expects; renaming a key touches nothing else.
//! The annotated variant additionally carries provenance metadata for
//! observability. It never changes behavior.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::env::{RawEnvironment, Source, SourceCounts};
use crate::core::schema::{FieldValue, Stage, ValidatedConfig};
use crate::error::{ValidationError, Violation};

/// The application-facing configuration.
///
/// Created only by the mapper; one-to-one with the validated
/// configuration it was projected from.
#[derive(Clone, PartialEq)]
pub struct AppConfig {
    /// Listening port.
    pub port: u16,
    /// Deployment stage.
    pub stage: Stage,
    /// Database connection string.
    pub database_url: String,
    /// Internal service API key.
    pub api_key: String,
    /// OpenAI API key.
    pub openai_key: String,
    /// Authentication provider tenant domain.
    pub auth_domain: String,
    /// Authentication provider client identifier.
    pub auth_client_id: String,
    /// Log verbosity.
    pub log_level: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets never reach logs through Debug formatting
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("stage", &self.stage)
            .field("database_url", &"<redacted>")
            .field("api_key", &"<redacted>")
            .field("openai_key", &"<redacted>")
            .field("auth_domain", &self.auth_domain)
            .field("auth_client_id", &self.auth_client_id)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// An [`AppConfig`] annotated with per-field provenance.
///
/// Observability only: consumers that care which source supplied each
/// field read this; nothing in the system behaves differently based on
/// it.
#[derive(Debug, Clone)]
pub struct AnnotatedConfig {
    /// The mapped configuration.
    pub config: AppConfig,
    /// Source of each external key that contributed a field. Keys that
    /// came from schema defaults are tagged [`Source::FallbackDefault`].
    pub sources: BTreeMap<String, Source>,
    /// Counts of resolved keys by source.
    pub counts: SourceCounts,
    /// When the mapping happened.
    pub resolved_at: DateTime<Utc>,
}

/// Serializable provenance summary of an [`AnnotatedConfig`].
#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceReport {
    pub sources: BTreeMap<String, Source>,
    pub counts: SourceCounts,
    pub resolved_at: DateTime<Utc>,
}

impl AnnotatedConfig {
    /// The provenance summary, without the configuration values.
    pub fn provenance(&self) -> ProvenanceReport {
        ProvenanceReport {
            sources: self.sources.clone(),
            counts: self.counts,
            resolved_at: self.resolved_at,
        }
    }
}

/// Project a validated configuration into the application's shape.
///
/// # Errors
///
/// Returns a [`ValidationError`] when a field the application shape
/// needs is absent from the validated set; with the application schema
/// this only happens if validation was bypassed with a custom schema.
pub fn map(validated: &ValidatedConfig) -> Result<AppConfig, ValidationError> {
    Ok(AppConfig {
        port: port_field(validated, "PORT")?,
        stage: stage_field(validated, "STAGE")?,
        database_url: text_field(validated, "DATABASE_URL")?,
        api_key: text_field(validated, "API_KEY")?,
        openai_key: text_field(validated, "OPENAI_KEY")?,
        auth_domain: text_field(validated, "AUTH_DOMAIN")?,
        auth_client_id: text_field(validated, "AUTH_CLIENT_ID")?,
        log_level: text_field(validated, "LOG_LEVEL")?,
    })
}

/// Project with provenance attached.
///
/// # Errors
///
/// Same conditions as [`map`].
pub fn map_annotated(
    validated: &ValidatedConfig,
    env: &RawEnvironment,
) -> Result<AnnotatedConfig, ValidationError> {
    let config = map(validated)?;

    let sources = validated
        .keys()
        .map(|key| {
            // Absent from the raw environment means the validator
            // filled the schema default
            let source = env.source(key).unwrap_or(Source::FallbackDefault);
            (key.to_string(), source)
        })
        .collect();

    Ok(AnnotatedConfig {
        config,
        sources,
        counts: env.source_counts(),
        resolved_at: Utc::now(),
    })
}

fn absent(key: &str) -> ValidationError {
    ValidationError {
        violations: vec![Violation {
            field: key.to_string(),
            constraint: "required field is missing from validated configuration".to_string(),
            value: None,
        }],
    }
}

fn text_field(validated: &ValidatedConfig, key: &str) -> Result<String, ValidationError> {
    validated
        .text(key)
        .map(str::to_string)
        .ok_or_else(|| absent(key))
}

fn port_field(validated: &ValidatedConfig, key: &str) -> Result<u16, ValidationError> {
    validated
        .get(key)
        .and_then(FieldValue::as_port)
        .ok_or_else(|| absent(key))
}

fn stage_field(validated: &ValidatedConfig, key: &str) -> Result<Stage, ValidationError> {
    validated
        .get(key)
        .and_then(FieldValue::as_stage)
        .ok_or_else(|| absent(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{validate, Schema};

    fn full_env() -> RawEnvironment {
        let mut env = RawEnvironment::new();
        env.insert("PORT", "8080", Source::Environment);
        env.insert("STAGE", "production", Source::Environment);
        env.insert("DATABASE_URL", "postgres://localhost/app", Source::LocalFile);
        env.insert("API_KEY", "sk-test-12345", Source::RemoteStore);
        env.insert("OPENAI_KEY", "sk-openai-67890", Source::RemoteStore);
        env.insert("AUTH_DOMAIN", "example.auth0.com", Source::Environment);
        env.insert("AUTH_CLIENT_ID", "client-abc", Source::Environment);
        env
    }

    #[test]
    fn test_map_renames_fields() {
        let env = full_env();
        let validated = validate(&env, &Schema::application()).unwrap();
        let config = map(&validated).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.stage, Stage::Production);
        assert_eq!(config.database_url, "postgres://localhost/app");
        assert_eq!(config.api_key, "sk-test-12345");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_map_is_deterministic() {
        let env = full_env();
        let validated = validate(&env, &Schema::application()).unwrap();
        assert_eq!(map(&validated).unwrap(), map(&validated).unwrap());
    }

    #[test]
    fn test_map_annotated_carries_provenance() {
        let env = full_env();
        let validated = validate(&env, &Schema::application()).unwrap();
        let annotated = map_annotated(&validated, &env).unwrap();

        assert_eq!(annotated.sources["API_KEY"], Source::RemoteStore);
        assert_eq!(annotated.sources["DATABASE_URL"], Source::LocalFile);
        // LOG_LEVEL came from the schema default, not the raw environment
        assert_eq!(annotated.sources["LOG_LEVEL"], Source::FallbackDefault);

        assert_eq!(annotated.counts.remote_store, 2);
        assert_eq!(annotated.counts.local_file, 1);
    }

    #[test]
    fn test_provenance_report_serializes() {
        let env = full_env();
        let validated = validate(&env, &Schema::application()).unwrap();
        let annotated = map_annotated(&validated, &env).unwrap();

        let json = serde_json::to_string(&annotated.provenance()).unwrap();
        assert!(json.contains("remote-store"));
        assert!(!json.contains("sk-test-12345"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let env = full_env();
        let validated = validate(&env, &Schema::application()).unwrap();
        let config = map(&validated).unwrap();

        let rendered = format!("{config:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("sk-test-12345"));
        assert!(!rendered.contains("postgres://localhost/app"));
    }
}
