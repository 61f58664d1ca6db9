use std::{env, path::PathBuf, time::Duration};

use crate::{
    constants::{
        self, AWS_CONFIG_DIR_NAME, AWS_CREDENTIALS_FILE_NAME, CREDENTIALS_FILE_ENV,
        DEFAULT_DURATION, DEFAULT_PROFILE, PROFILE_ENV,
    },
    error::CredentialsError,
};

/// Settings for role assumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StsOptions {
    /// Lifetime requested for assumed sessions
    pub duration: Duration,
    /// How long before the real expiration the resolver reports itself expired.
    ///
    /// A window of 10s makes `is_expired` return true 10 seconds before the
    /// session actually ends.
    pub expiry_window: Duration,
}

impl Default for StsOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            expiry_window: Duration::ZERO,
        }
    }
}

/// Locate the shared credentials file.
///
/// Priority: explicit override -> `AWS_SHARED_CREDENTIALS_FILE` ->
/// `<home>/.aws/credentials`.
pub fn resolve_credentials_path(
    explicit: Option<&PathBuf>,
) -> Result<PathBuf, CredentialsError> {
    if let Some(path) = explicit.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(path.clone());
    }

    if let Some(path) = non_empty_env(CREDENTIALS_FILE_ENV) {
        return Ok(PathBuf::from(path));
    }

    Ok(constants::home_dir()?
        .join(AWS_CONFIG_DIR_NAME)
        .join(AWS_CREDENTIALS_FILE_NAME))
}

/// Pick the active profile: explicit override -> `AWS_PROFILE` -> `default`
pub fn resolve_profile_name(explicit: Option<&str>) -> String {
    explicit
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| non_empty_env(PROFILE_ENV))
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}
