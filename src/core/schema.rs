//! Typed schema definition and validation for raw configuration.
//!
//! The schema is the single description of what the application expects
//! from its environment: which keys exist, their types and constraints,
//! which are sensitive, which live in the remote store. Validation is
//! all-or-nothing: either every required field passes and a
//! [`ValidatedConfig`] is produced, or the full list of violations is
//! returned.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::core::constants::{DEFAULT_PORT, DEFAULT_STAGE, PORT_VAR, STAGE_VAR};
use crate::core::env::RawEnvironment;
use crate::error::{ValidationError, Violation};

/// Deployment stage of the running application.
///
/// A closed enumeration plus ephemeral `preview-<number>` deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Dev,
    Test,
    Staging,
    Production,
    /// Ephemeral preview deployment, numbered per pull request.
    Preview(u32),
}

impl Stage {
    /// Whether this stage is the test stage.
    pub fn is_test(&self) -> bool {
        matches!(self, Stage::Test)
    }

    /// Whether this stage is an ephemeral preview deployment.
    pub fn is_preview(&self) -> bool {
        matches!(self, Stage::Preview(_))
    }
}

impl FromStr for Stage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Stage::Dev),
            "test" => Ok(Stage::Test),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            other => other
                .strip_prefix("preview-")
                .and_then(|n| n.parse::<u32>().ok())
                .map(Stage::Preview)
                .ok_or(()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Dev => f.write_str("dev"),
            Stage::Test => f.write_str("test"),
            Stage::Staging => f.write_str("staging"),
            Stage::Production => f.write_str("production"),
            Stage::Preview(n) => write!(f, "preview-{n}"),
        }
    }
}

/// Type constraint for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any non-empty string.
    Text,
    /// TCP port, 1-65535.
    Port,
    /// Deployment stage name (see [`Stage`]).
    Stage,
}

/// Specification of one configuration field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// External environment key.
    pub key: &'static str,
    /// Type constraint.
    pub kind: FieldKind,
    /// Whether resolution fails when the field is absent.
    pub required: bool,
    /// Sensitive fields never appear in violation values or logs.
    pub sensitive: bool,
    /// Whether the managed-runtime loader fetches this key from the
    /// remote store.
    pub remote: bool,
    /// Static default applied when the key is absent.
    pub default: Option<&'static str>,
    /// Static fallback used by the managed-runtime loader when the
    /// remote store cannot supply the key.
    pub fallback: Option<&'static str>,
}

impl FieldSpec {
    /// A required plain-text field.
    pub const fn text(key: &'static str) -> Self {
        Self {
            key,
            kind: FieldKind::Text,
            required: true,
            sensitive: false,
            remote: false,
            default: None,
            fallback: None,
        }
    }

    /// Mark the field sensitive.
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Mark the field as remotely sourced.
    pub const fn remote(mut self) -> Self {
        self.remote = true;
        self
    }

    /// Make the field optional with a static default.
    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    /// Attach a static fallback for remote outages.
    pub const fn with_fallback(mut self, fallback: &'static str) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Change the type constraint.
    pub const fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }
}

/// The full field registry the application validates against.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Build a schema from explicit field specs.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The application's field registry.
    pub fn application() -> Self {
        Self::new(vec![
            FieldSpec::text(PORT_VAR)
                .kind(FieldKind::Port)
                .with_default(DEFAULT_PORT),
            FieldSpec::text(STAGE_VAR)
                .kind(FieldKind::Stage)
                .with_default(DEFAULT_STAGE),
            FieldSpec::text("DATABASE_URL").sensitive().remote(),
            FieldSpec::text("API_KEY").sensitive().remote(),
            FieldSpec::text("OPENAI_KEY")
                .sensitive()
                .remote()
                .with_fallback("placeholder:OPENAI_KEY"),
            FieldSpec::text("AUTH_DOMAIN"),
            FieldSpec::text("AUTH_CLIENT_ID"),
            FieldSpec::text("LOG_LEVEL").with_default("info"),
        ])
    }

    /// All field specs, in registry order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up one field spec.
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// The fixed registry of keys the managed-runtime loader asks the
    /// remote store for.
    pub fn remote_keys(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.remote)
            .map(|f| f.key)
            .collect()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::application()
    }
}

/// A typed value produced by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Port(u16),
    Stage(Stage),
}

impl FieldValue {
    /// The value as text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a port, if it is one.
    pub fn as_port(&self) -> Option<u16> {
        match self {
            FieldValue::Port(p) => Some(*p),
            _ => None,
        }
    }

    /// The value as a stage, if it is one.
    pub fn as_stage(&self) -> Option<Stage> {
        match self {
            FieldValue::Stage(s) => Some(*s),
            _ => None,
        }
    }
}

/// A fully-validated, immutable configuration.
///
/// Produced only by [`validate`]; never contains a value that failed
/// validation. Partial validation is not exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    values: BTreeMap<&'static str, FieldValue>,
}

impl ValidatedConfig {
    fn new(values: BTreeMap<&'static str, FieldValue>) -> Self {
        Self { values }
    }

    /// Typed value of a field, if present.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Text value of a field, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// Keys with validated values, in registry order of the schema that
    /// produced them.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }

    /// Number of validated fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no field validated (only possible with an empty schema).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validate a raw environment against a schema.
///
/// Collects every violation rather than stopping at the first, so a
/// failed startup reports the complete list of problems at once.
///
/// # Errors
///
/// Returns [`ValidationError`] when any required or type constraint
/// fails. Sensitive values are elided from the violations.
pub fn validate(env: &RawEnvironment, schema: &Schema) -> Result<ValidatedConfig, ValidationError> {
    let mut values = BTreeMap::new();
    let mut violations = Vec::new();

    for spec in schema.fields() {
        match env.get(spec.key).or(spec.default) {
            None => {
                if spec.required {
                    violations.push(missing(spec));
                }
            }
            Some(raw) => match check(spec, raw) {
                Ok(value) => {
                    values.insert(spec.key, value);
                }
                Err(violation) => violations.push(violation),
            },
        }
    }

    if violations.is_empty() {
        Ok(ValidatedConfig::new(values))
    } else {
        Err(ValidationError { violations })
    }
}

/// Lenient variant used when the caller disables validation.
///
/// Violations are logged as warnings and the field falls back to its
/// default, or to a neutral stand-in for its kind, so the pipeline can
/// still produce a complete configuration.
pub fn coerce(env: &RawEnvironment, schema: &Schema) -> ValidatedConfig {
    let mut values = BTreeMap::new();

    for spec in schema.fields() {
        let value = match env.get(spec.key).or(spec.default) {
            Some(raw) => check(spec, raw).unwrap_or_else(|violation| {
                warn!(field = spec.key, %violation, "validation disabled, substituting stand-in");
                stand_in(spec)
            }),
            None => {
                if spec.required {
                    warn!(field = spec.key, "validation disabled, substituting stand-in for missing field");
                }
                stand_in(spec)
            }
        };
        values.insert(spec.key, value);
    }

    ValidatedConfig::new(values)
}

fn missing(spec: &FieldSpec) -> Violation {
    Violation {
        field: spec.key.to_string(),
        constraint: "required field is missing".to_string(),
        value: None,
    }
}

fn check(spec: &FieldSpec, raw: &str) -> Result<FieldValue, Violation> {
    let violation = |constraint: &str| Violation {
        field: spec.key.to_string(),
        constraint: constraint.to_string(),
        value: (!spec.sensitive).then(|| raw.to_string()),
    };

    if raw.is_empty() {
        return Err(violation("must not be empty"));
    }

    match spec.kind {
        FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Port => match raw.parse::<u16>() {
            Ok(0) | Err(_) => Err(violation("must be a port number (1-65535)")),
            Ok(port) => Ok(FieldValue::Port(port)),
        },
        FieldKind::Stage => raw
            .parse::<Stage>()
            .map(FieldValue::Stage)
            .map_err(|()| violation("must be dev, test, staging, production, or preview-<number>")),
    }
}

fn stand_in(spec: &FieldSpec) -> FieldValue {
    match spec.kind {
        FieldKind::Text => FieldValue::Text(format!(
            "{}{}",
            crate::core::constants::PLACEHOLDER_PREFIX,
            spec.key
        )),
        FieldKind::Port => FieldValue::Port(3000),
        FieldKind::Stage => FieldValue::Stage(Stage::Dev),
    }
}
