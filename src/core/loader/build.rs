//! Build-time loader: placeholders instead of secrets.
//!
//! One-shot build tooling needs a schema-valid configuration but no real
//! secrets. This loader never touches the network or reads override
//! files: it takes the handful of fields build tooling actually uses
//! from process values (with static defaults) and fills every other
//! required field with a recognizable placeholder.

use tracing::debug;

use crate::core::constants::{DEFAULT_PORT, DEFAULT_STAGE, PLACEHOLDER_PREFIX, PORT_VAR, STAGE_VAR};
use crate::core::env::{EnvSnapshot, RawEnvironment, Source};
use crate::core::schema::{Schema, Stage};
use crate::error::SourceError;

/// The placeholder value for one key.
pub fn placeholder_for(key: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{key}")
}

/// Load the build-time environment.
///
/// Only `PORT` and `STAGE` take real values (from the snapshot, or their
/// static defaults); every other required, non-defaulted field receives
/// a placeholder so validation passes without secrets.
///
/// # Errors
///
/// Fails only when an explicitly-set build field is self-contradictory:
/// an out-of-range `PORT` or an unrecognized `STAGE`.
pub fn load(snapshot: &EnvSnapshot, schema: &Schema) -> Result<RawEnvironment, SourceError> {
    let mut env = RawEnvironment::new();

    match snapshot.get(PORT_VAR) {
        Some(value) => {
            if value.parse::<u16>().map_or(true, |port| port == 0) {
                return Err(SourceError::InvalidValue {
                    key: PORT_VAR.to_string(),
                    reason: format!("{value:?} is not a port number (1-65535)"),
                });
            }
            env.insert(PORT_VAR, value, Source::Environment);
        }
        None => env.insert(PORT_VAR, DEFAULT_PORT, Source::FallbackDefault),
    }

    match snapshot.get(STAGE_VAR) {
        Some(value) => {
            if value.parse::<Stage>().is_err() {
                return Err(SourceError::InvalidValue {
                    key: STAGE_VAR.to_string(),
                    reason: format!("{value:?} is not a recognized stage name"),
                });
            }
            env.insert(STAGE_VAR, value, Source::Environment);
        }
        None => env.insert(STAGE_VAR, DEFAULT_STAGE, Source::FallbackDefault),
    }

    for spec in schema.fields() {
        if spec.key == PORT_VAR || spec.key == STAGE_VAR {
            continue;
        }
        if spec.required && spec.default.is_none() {
            env.insert(spec.key, placeholder_for(spec.key), Source::FallbackDefault);
        }
    }

    debug!(keys = env.len(), "build-time environment assembled");
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_environment_gets_placeholders() {
        let env = load(&EnvSnapshot::default(), &Schema::application()).unwrap();

        assert_eq!(env.get("PORT"), Some("3000"));
        assert_eq!(env.get("STAGE"), Some("dev"));
        assert_eq!(env.source("PORT"), Some(Source::FallbackDefault));

        for key in ["DATABASE_URL", "API_KEY", "OPENAI_KEY", "AUTH_DOMAIN", "AUTH_CLIENT_ID"] {
            let value = env.get(key).unwrap();
            assert!(
                value.starts_with(PLACEHOLDER_PREFIX),
                "{key} should be a placeholder, got {value:?}"
            );
            assert_eq!(env.source(key), Some(Source::FallbackDefault));
        }
    }

    #[test]
    fn test_explicit_build_fields_are_kept() {
        let snapshot = EnvSnapshot::from_pairs([("PORT", "8080"), ("STAGE", "staging")]);
        let env = load(&snapshot, &Schema::application()).unwrap();

        assert_eq!(env.get("PORT"), Some("8080"));
        assert_eq!(env.source("PORT"), Some(Source::Environment));
        assert_eq!(env.get("STAGE"), Some("staging"));
    }

    #[test]
    fn test_secrets_in_environment_are_ignored() {
        // Build output must not embed real secrets even when they exist
        let snapshot = EnvSnapshot::from_pairs([("API_KEY", "sk-live-real")]);
        let env = load(&snapshot, &Schema::application()).unwrap();

        assert_eq!(env.get("API_KEY"), Some("placeholder:API_KEY"));
    }

    #[test]
    fn test_out_of_range_port_fails() {
        let snapshot = EnvSnapshot::from_pairs([("PORT", "99999")]);
        let err = load(&snapshot, &Schema::application()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidValue { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn test_unrecognized_stage_fails() {
        let snapshot = EnvSnapshot::from_pairs([("STAGE", "prod")]);
        let err = load(&snapshot, &Schema::application()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidValue { ref key, .. } if key == "STAGE"));
    }
}
