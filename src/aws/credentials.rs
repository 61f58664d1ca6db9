//! Loading and validating profiles from the shared credentials file.

use std::path::{Path, PathBuf};

use ini::{Ini, Properties};
use tracing::{debug, warn};

use super::Credentials;
use crate::error::CredentialsError;

/// One named profile from the shared credentials file.
///
/// A key that is absent from the section is `None`, a key that is present but
/// blank is `Some("")`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub role_arn: Option<String>,
    pub source_profile: Option<String>,
    pub role_session_name: Option<String>,
    pub external_id: Option<String>,
    pub mfa_serial: Option<String>,
    pub duration_seconds: Option<u32>,
}

impl Profile {
    fn from_ini_section(name: &str, section: &Properties) -> Self {
        let get = |key: &str| section.get(key).map(|value| value.trim().to_string());

        let duration_seconds = section.get("duration_seconds").and_then(|raw| {
            raw.trim()
                .parse()
                .inspect_err(|_| warn!("Ignoring invalid duration_seconds '{raw}' in profile {name}"))
                .ok()
        });

        Self {
            name: name.to_string(),
            access_key_id: get("aws_access_key_id").unwrap_or_default(),
            secret_access_key: get("aws_secret_access_key").unwrap_or_default(),
            session_token: get("aws_session_token").filter(|token| !token.is_empty()),
            role_arn: get("role_arn"),
            source_profile: get("source_profile"),
            role_session_name: get("role_session_name"),
            external_id: get("external_id").filter(|id| !id.is_empty()),
            mfa_serial: get("mfa_serial").filter(|serial| !serial.is_empty()),
            duration_seconds,
        }
    }

    /// Role to assume, when this profile chains to a source profile
    pub fn role_arn(&self) -> Option<&str> {
        self.role_arn.as_deref().filter(|arn| !arn.is_empty())
    }

    pub fn is_role_chained(&self) -> bool {
        self.role_arn().is_some()
    }

    /// Static keys held directly by the profile
    pub fn static_credentials(&self) -> Credentials {
        Credentials::from_keys(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            self.session_token.clone(),
        )
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("access_key_id", &self.access_key_id)
            .field("role_arn", &self.role_arn)
            .field("source_profile", &self.source_profile)
            .field("role_session_name", &self.role_session_name)
            .field("mfa_serial", &self.mfa_serial)
            .field("duration_seconds", &self.duration_seconds)
            .finish_non_exhaustive()
    }
}

/// A parsed shared credentials file
#[derive(Debug)]
pub struct CredentialsFile {
    path: PathBuf,
    ini: Ini,
}

impl CredentialsFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialsError> {
        let path = path.into();
        let ini = Ini::load_from_file(&path).map_err(|source| {
            CredentialsError::CredentialsFileLoadFailure {
                path: path.clone(),
                source,
            }
        })?;
        debug!("Loaded shared credentials file {}", path.display());
        Ok(Self { path, ini })
    }

    /// Parse credentials from memory; `path` is only used in error messages.
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Result<Self, CredentialsError> {
        let path = path.into();
        let ini = Ini::load_from_str(contents).map_err(|source| {
            CredentialsError::CredentialsFileLoadFailure {
                path: path.clone(),
                source: ini::Error::Parse(source),
            }
        })?;
        Ok(Self { path, ini })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the profile stored in section `name`
    pub fn load_profile(&self, name: &str) -> Result<Profile, CredentialsError> {
        let section =
            self.ini
                .section(Some(name))
                .ok_or_else(|| CredentialsError::ProfileNotFound {
                    profile: name.to_string(),
                    path: self.path.clone(),
                })?;

        let profile = Profile::from_ini_section(name, section);
        validate(&profile, &self.path)?;

        debug!(
            "Loaded profile {} (role chained: {})",
            name,
            profile.is_role_chained()
        );
        Ok(profile)
    }
}

fn validate(profile: &Profile, path: &Path) -> Result<(), CredentialsError> {
    let owned = || (profile.name.clone(), path.to_path_buf());

    if profile.is_role_chained() {
        // An absent source_profile defaults during resolution; a blank one is an error
        if profile.source_profile.as_deref() == Some("") {
            let (profile, path) = owned();
            return Err(CredentialsError::MissingSourceProfile { profile, path });
        }
        return Ok(());
    }

    if profile.access_key_id.is_empty() {
        let (profile, path) = owned();
        return Err(CredentialsError::MissingAccessKey { profile, path });
    }
    if profile.secret_access_key.is_empty() {
        let (profile, path) = owned();
        return Err(CredentialsError::MissingSecretKey { profile, path });
    }
    Ok(())
}
