//! Deployment context classification.
//!
//! Inspects process signals to decide which source loader applies.
//! Classification is a pure function of the snapshot: no side effects,
//! no failure mode, ambiguous signals default to local development.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::core::constants::{CI_MARKERS, REQUIRE_REMOTE_VAR, SSM_PREFIX_VAR, STAGE_VAR};
use crate::core::env::EnvSnapshot;
use crate::core::schema::Stage;

/// The category of process lifecycle a resolution runs in.
///
/// Determined once per resolution and immutable for the lifetime of the
/// resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentContext {
    /// One-shot build tooling; no network, no local override files.
    BuildTime,
    /// Local development; override files allowed, no remote store.
    Local,
    /// Managed runtime with network access to the remote store.
    ManagedRuntime,
}

impl DeploymentContext {
    /// Stable identifier used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentContext::BuildTime => "build-time",
            DeploymentContext::Local => "local",
            DeploymentContext::ManagedRuntime => "managed-runtime",
        }
    }

    /// Whether the loader for this context performs network I/O.
    pub fn needs_network(&self) -> bool {
        matches!(self, DeploymentContext::ManagedRuntime)
    }
}

impl fmt::Display for DeploymentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the deployment context from process signals.
///
/// Decision order, first match wins:
/// 1. CI markers present and the remote-config override unset → build-time.
/// 2. A remote-store prefix, or a `preview-<number>` stage → managed-runtime.
/// 3. Otherwise → local.
pub fn classify(snapshot: &EnvSnapshot) -> DeploymentContext {
    let ci = CI_MARKERS.iter().any(|marker| snapshot.is_truthy(marker));
    if ci && !snapshot.is_truthy(REQUIRE_REMOTE_VAR) {
        trace!("CI marker present, classifying as build-time");
        return DeploymentContext::BuildTime;
    }

    let has_store_prefix = snapshot
        .get(SSM_PREFIX_VAR)
        .map_or(false, |v| !v.trim().is_empty());
    let preview_stage = snapshot
        .get(STAGE_VAR)
        .and_then(|v| v.parse::<Stage>().ok())
        .map_or(false, |stage| stage.is_preview());

    if has_store_prefix || preview_stage {
        trace!(
            store_prefix = has_store_prefix,
            preview = preview_stage,
            "remote signal present, classifying as managed-runtime"
        );
        return DeploymentContext::ManagedRuntime;
    }

    DeploymentContext::Local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signals_is_local() {
        let snapshot = EnvSnapshot::from_pairs([("HOME", "/home/dev")]);
        assert_eq!(classify(&snapshot), DeploymentContext::Local);
    }

    #[test]
    fn test_ci_marker_is_build_time() {
        let snapshot = EnvSnapshot::from_pairs([("CI", "true")]);
        assert_eq!(classify(&snapshot), DeploymentContext::BuildTime);

        let snapshot = EnvSnapshot::from_pairs([("GITHUB_ACTIONS", "true")]);
        assert_eq!(classify(&snapshot), DeploymentContext::BuildTime);
    }

    #[test]
    fn test_require_remote_overrides_ci() {
        let snapshot = EnvSnapshot::from_pairs([
            ("CI", "true"),
            ("WELLSPRING_REQUIRE_REMOTE", "1"),
            ("WELLSPRING_SSM_PREFIX", "/app/prod"),
        ]);
        assert_eq!(classify(&snapshot), DeploymentContext::ManagedRuntime);
    }

    #[test]
    fn test_store_prefix_is_managed_runtime() {
        let snapshot = EnvSnapshot::from_pairs([("WELLSPRING_SSM_PREFIX", "/app/prod")]);
        assert_eq!(classify(&snapshot), DeploymentContext::ManagedRuntime);
    }

    #[test]
    fn test_blank_store_prefix_is_not_a_signal() {
        let snapshot = EnvSnapshot::from_pairs([("WELLSPRING_SSM_PREFIX", "  ")]);
        assert_eq!(classify(&snapshot), DeploymentContext::Local);
    }

    #[test]
    fn test_preview_stage_is_managed_runtime() {
        let snapshot = EnvSnapshot::from_pairs([("STAGE", "preview-123")]);
        assert_eq!(classify(&snapshot), DeploymentContext::ManagedRuntime);
    }

    #[test]
    fn test_non_numeric_preview_suffix_is_local() {
        let snapshot = EnvSnapshot::from_pairs([("STAGE", "preview-abc")]);
        assert_eq!(classify(&snapshot), DeploymentContext::Local);
    }

    #[test]
    fn test_ci_beats_remote_signal() {
        let snapshot =
            EnvSnapshot::from_pairs([("CI", "true"), ("WELLSPRING_SSM_PREFIX", "/app/prod")]);
        assert_eq!(classify(&snapshot), DeploymentContext::BuildTime);
    }

    #[test]
    fn test_false_ci_marker_is_ignored() {
        let snapshot = EnvSnapshot::from_pairs([("CI", "false")]);
        assert_eq!(classify(&snapshot), DeploymentContext::Local);
    }
}
