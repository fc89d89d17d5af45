//! Raw environment assembly and provenance tracking.
//!
//! A [`RawEnvironment`] is built incrementally by the source loaders:
//! base process values first, then override files, then remote-store
//! values, merging last-write-wins. Every key carries exactly one
//! [`Source`] tag recording which source last wrote it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::SourceError;

/// Which source last supplied a configuration key's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Plain process environment value.
    Environment,
    /// A local override file (.env and friends).
    LocalFile,
    /// The remote secret/parameter store.
    RemoteStore,
    /// A static default or fallback baked into the schema or loader.
    FallbackDefault,
}

impl Source {
    /// Stable identifier used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Environment => "environment",
            Source::LocalFile => "local-file",
            Source::RemoteStore => "remote-store",
            Source::FallbackDefault => "fallback-default",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable capture of process environment values.
///
/// Classifier and loaders read from a snapshot instead of the global
/// environment bag, so tests can inject arbitrary environments and a
/// single resolution sees one consistent view.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    values: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether a marker variable is set to an affirmative value.
    ///
    /// CI systems conventionally export markers as `true` or `1`; an
    /// explicit `false`/`0` counts as unset.
    pub fn is_truthy(&self, key: &str) -> bool {
        match self.get(key) {
            Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => false,
        }
    }

    /// Iterate over all captured pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of captured pairs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Counts of resolved keys by source, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub environment: usize,
    pub local_file: usize,
    pub remote_store: usize,
    pub fallback_default: usize,
}

impl SourceCounts {
    /// Total number of counted keys.
    pub fn total(&self) -> usize {
        self.environment + self.local_file + self.remote_store + self.fallback_default
    }
}

/// The merged raw key/value map plus per-key provenance.
///
/// Keys are unique; merging is last-write-wins for both the value and
/// its provenance tag.
#[derive(Debug, Clone, Default)]
pub struct RawEnvironment {
    values: BTreeMap<String, String>,
    sources: BTreeMap<String, Source>,
}

impl RawEnvironment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an environment from a snapshot; every key is tagged
    /// [`Source::Environment`].
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let mut env = Self::new();
        for (k, v) in snapshot.iter() {
            env.insert(k, v, Source::Environment);
        }
        env
    }

    /// Insert a value, replacing any previous value and provenance.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>, source: Source) {
        let key = key.into();
        self.values.insert(key.clone(), value.into());
        self.sources.insert(key, source);
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Provenance of a key, if present.
    pub fn source(&self, key: &str) -> Option<Source> {
        self.sources.get(key).copied()
    }

    /// Iterate over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the environment is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Count keys by provenance.
    pub fn source_counts(&self) -> SourceCounts {
        let mut counts = SourceCounts::default();
        for source in self.sources.values() {
            match source {
                Source::Environment => counts.environment += 1,
                Source::LocalFile => counts.local_file += 1,
                Source::RemoteStore => counts.remote_store += 1,
                Source::FallbackDefault => counts.fallback_default += 1,
            }
        }
        counts
    }
}

/// Parse dotenv-style file contents into key/value pairs.
///
/// Skips empty lines and `#` comments, strips an optional `export `
/// prefix, and unquotes single- or double-quoted values. A line without
/// an `=` assignment is malformed.
///
/// # Errors
///
/// Returns [`SourceError::MalformedFile`] naming the offending line.
pub fn parse_env_file(contents: &str, file: &str) -> Result<Vec<(String, String)>, SourceError> {
    let mut pairs = Vec::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

        let Some((key, value)) = line.split_once('=') else {
            return Err(SourceError::MalformedFile {
                file: file.to_string(),
                line: idx + 1,
                reason: "expected KEY=value assignment".to_string(),
            });
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(SourceError::MalformedFile {
                file: file.to_string(),
                line: idx + 1,
                reason: "empty key".to_string(),
            });
        }

        let value = unquote(value.trim());
        pairs.push((key.to_string(), value.to_string()));
    }

    Ok(pairs)
}

/// Strip one matching pair of surrounding quotes, if any.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
