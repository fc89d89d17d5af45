//! Constants used throughout wellspring.
//!
//! Centralizes well-known keys, file names, and defaults.

/// Base override file, lowest priority (.env).
pub const BASE_ENV_FILE: &str = ".env";

/// Machine-local override file, applied on top of the base file (.env.local).
pub const LOCAL_ENV_FILE: &str = ".env.local";

/// Test-only override file, applied only when the stage is `test` (.env.test).
pub const TEST_ENV_FILE: &str = ".env.test";

/// Prefix of every build-time placeholder value.
///
/// Placeholders satisfy schema validation without carrying real secrets,
/// and are recognizable so they can never be mistaken for production values.
pub const PLACEHOLDER_PREFIX: &str = "placeholder:";

/// Default time-to-live for cached remote secrets (five minutes).
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Default listening port when PORT is unset.
pub const DEFAULT_PORT: &str = "3000";

/// Default deployment stage when STAGE is unset.
pub const DEFAULT_STAGE: &str = "dev";

/// Environment key holding the listening port.
pub const PORT_VAR: &str = "PORT";

/// Environment key holding the deployment stage name.
pub const STAGE_VAR: &str = "STAGE";

/// Continuous-integration markers checked by the classifier.
pub const CI_MARKERS: &[&str] = &["CI", "GITHUB_ACTIONS"];

/// Override forcing remote configuration even under CI markers.
pub const REQUIRE_REMOTE_VAR: &str = "WELLSPRING_REQUIRE_REMOTE";

/// Remote-store address prefix signal checked by the classifier.
pub const SSM_PREFIX_VAR: &str = "WELLSPRING_SSM_PREFIX";
