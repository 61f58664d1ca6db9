use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by pluggable collaborators (STS client, cache codecs)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CredentialsError {
    #[error("user home directory not found (neither HOME nor USERPROFILE is set)")]
    HomeDirectoryNotFound,
    #[error("failed to load shared credentials file {path}: {source}")]
    CredentialsFileLoadFailure { path: PathBuf, source: ini::Error },
    #[error("profile '{profile}' not found in {path}")]
    ProfileNotFound { profile: String, path: PathBuf },
    #[error("shared credentials {profile} in {path} did not contain aws_access_key_id")]
    MissingAccessKey { profile: String, path: PathBuf },
    #[error("shared credentials {profile} in {path} did not contain aws_secret_access_key")]
    MissingSecretKey { profile: String, path: PathBuf },
    #[error("shared credentials {profile} in {path} did not contain source_profile")]
    MissingSourceProfile { profile: String, path: PathBuf },
    #[error(
        "source profile '{source_profile}' of '{profile}' in {path} assumes a role itself; only static source profiles are supported"
    )]
    ChainedSourceProfile {
        profile: String,
        source_profile: String,
        path: PathBuf,
    },
    #[error("failed to assume role {role_arn} for profile '{profile}': {source}")]
    AssumeRoleFailure {
        profile: String,
        role_arn: String,
        source: BoxError,
    },
    #[error("failed to read cached session {location}: {source}")]
    CacheReadFailure { location: String, source: BoxError },
    #[error("failed to write cached session {location}: {source}")]
    CacheWriteFailure { location: String, source: BoxError },
}

impl CredentialsError {
    /// Profile the error is attributed to, if any
    pub fn profile(&self) -> Option<&str> {
        match self {
            Self::ProfileNotFound { profile, .. }
            | Self::MissingAccessKey { profile, .. }
            | Self::MissingSecretKey { profile, .. }
            | Self::MissingSourceProfile { profile, .. }
            | Self::ChainedSourceProfile { profile, .. }
            | Self::AssumeRoleFailure { profile, .. } => Some(profile),
            Self::HomeDirectoryNotFound
            | Self::CredentialsFileLoadFailure { .. }
            | Self::CacheReadFailure { .. }
            | Self::CacheWriteFailure { .. } => None,
        }
    }

    /// Cache failures are reported alongside successfully resolved credentials
    /// rather than replacing them.
    pub fn is_cache_failure(&self) -> bool {
        matches!(
            self,
            Self::CacheReadFailure { .. } | Self::CacheWriteFailure { .. }
        )
    }
}
