//! Error types for wellspring operations.
//!
//! Every fallible operation returns [`Result`]. The resolution facade is
//! the only place that decides whether an inner error is fatal to the
//! overall resolution; lower layers just report what happened.

use std::fmt;

use thiserror::Error;

use crate::core::resolver::ResolutionStage;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by the resolution facade.
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("source load failed: {0}")]
    Source(#[from] SourceError),

    #[error("secret cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("remote store error: {0}")]
    Store(#[from] StoreError),

    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The pipeline stage this error belongs to, if it arose inside a
    /// resolution call.
    pub fn stage(&self) -> Option<ResolutionStage> {
        match self {
            Error::Validation(_) => Some(ResolutionStage::Validate),
            Error::Source(_) | Error::Cache(_) | Error::Store(_) => Some(ResolutionStage::Load),
            Error::Usage(_) => Some(ResolutionStage::Classify),
            Error::Json(_) => None,
        }
    }
}

/// A single failed constraint for one schema field.
///
/// `value` carries the offending raw value for non-sensitive fields and
/// is `None` for sensitive ones, so validation failures can be logged
/// without leaking secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// External key of the field that failed.
    pub field: String,
    /// Human-readable description of the violated constraint.
    pub constraint: String,
    /// Offending value, elided when the field is sensitive.
    pub value: Option<String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}: {} (got {:?})", self.field, self.constraint, v),
            None => write!(f, "{}: {}", self.field, self.constraint),
        }
    }
}

/// One or more schema fields failed validation.
///
/// Always fatal to resolution: a partially-valid configuration is never
/// exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Every violation found, one per failed field constraint.
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed validation", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n  - {}", v)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A source loader could not produce a raw environment.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {file}: {source}")]
    ReadFile {
        file: String,
        source: std::io::Error,
    },

    #[error("malformed line {line} in {file}: {reason}")]
    MalformedFile {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("invalid {key} in process environment: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("remote store is authoritative but keys could not be resolved: {keys:?}")]
    RemoteAuthoritative { keys: Vec<String> },
}

/// The remote secret/parameter store reported a problem for one key.
///
/// This is the full contract the resolution engine imposes on a store:
/// a key either has a string value, is known to be absent, or the store
/// is unavailable. Client-level timeouts surface as [`StoreError::Unavailable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found in remote store: {0}")]
    NotFound(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// The secret cache could not serve a request.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("fetch failed for {key}: {source}")]
    Fetch { key: String, source: StoreError },

    #[error("batch fetch failed for {keys:?}: {detail}")]
    Partial { keys: Vec<String>, detail: String },
}

/// Caller-programming errors.
#[derive(Error, Debug)]
pub enum UsageError {
    #[error(
        "synchronous resolution requested but classification selected managed-runtime, \
         which requires network access; use resolve() instead"
    )]
    SyncInManagedRuntime,
}
