//! Local development loader: process values plus dotenv-style override
//! files.
//!
//! Override files are merged in fixed ascending priority: `.env`, then
//! `.env.local`, then `.env.test` when the stage is `test`. A missing
//! file is not an error; a malformed one is.

use std::path::Path;

use tracing::{debug, trace};

use crate::core::constants::{BASE_ENV_FILE, LOCAL_ENV_FILE, STAGE_VAR, TEST_ENV_FILE};
use crate::core::env::{parse_env_file, EnvSnapshot, RawEnvironment, Source};
use crate::core::schema::Stage;
use crate::error::SourceError;

/// Load the local-development environment.
///
/// Starts from the snapshot and merges each override file found under
/// `dir` on top, last write wins.
///
/// # Errors
///
/// Returns [`SourceError::ReadFile`] when a present file cannot be read
/// and [`SourceError::MalformedFile`] when a line is not a `KEY=value`
/// assignment.
pub fn load(snapshot: &EnvSnapshot, dir: &Path) -> Result<RawEnvironment, SourceError> {
    let mut env = RawEnvironment::from_snapshot(snapshot);

    for file in override_files(snapshot) {
        let path = dir.join(file);
        if !path.exists() {
            trace!(file, "optional override file absent, skipping");
            continue;
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| SourceError::ReadFile {
            file: file.to_string(),
            source,
        })?;

        let pairs = parse_env_file(&contents, file)?;
        debug!(file, keys = pairs.len(), "merging override file");
        for (key, value) in pairs {
            env.insert(key, value, Source::LocalFile);
        }
    }

    Ok(env)
}

/// The override files that apply, lowest priority first.
fn override_files(snapshot: &EnvSnapshot) -> Vec<&'static str> {
    let mut files = vec![BASE_ENV_FILE, LOCAL_ENV_FILE];

    let test_stage = snapshot
        .get(STAGE_VAR)
        .and_then(|v| v.parse::<Stage>().ok())
        .map_or(false, |stage| stage.is_test());
    if test_stage {
        files.push(TEST_ENV_FILE);
    }

    files
}
