use std::{env, path::PathBuf, time::Duration};

use crate::error::CredentialsError;

/// Name reported as the source of every credential this crate hands out
pub const PROVIDER_NAME: &str = "SharedCredentialsProvider";

/// Profile used when neither an override nor `AWS_PROFILE` is set
pub const DEFAULT_PROFILE: &str = "default";

/// Environment variable overriding the shared credentials file location
pub const CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Environment variable selecting the active profile
pub const PROFILE_ENV: &str = "AWS_PROFILE";

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS shared credentials file name
pub const AWS_CREDENTIALS_FILE_NAME: &str = "credentials";

/// Cache directory used by the AWS CLI, relative to the home directory
pub const AWS_CLI_CACHE_DIR: [&str; 3] = [AWS_CONFIG_DIR_NAME, "cli", "cache"];

/// Default lifetime requested for assumed role sessions
pub const DEFAULT_DURATION: Duration = Duration::from_secs(15 * 60);

/// Default AWS region for STS operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Resolve the user's home directory from `HOME`, falling back to `USERPROFILE`
pub fn home_dir() -> Result<PathBuf, CredentialsError> {
    home_dir_from(|key| env::var(key).ok())
}

pub(crate) fn home_dir_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, CredentialsError> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .filter_map(&lookup)
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or(CredentialsError::HomeDirectoryNotFound)
}

/// Default location of the AWS CLI session cache: `<home>/.aws/cli/cache`
pub fn default_cache_dir() -> Result<PathBuf, CredentialsError> {
    let mut dir = home_dir()?;
    dir.extend(AWS_CLI_CACHE_DIR);
    Ok(dir)
}
