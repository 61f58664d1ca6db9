use std::{fmt, time::SystemTime};

use aws_smithy_types::{DateTime, date_time::Format};
use serde::{Deserialize, Serialize};

use crate::constants::PROVIDER_NAME;

pub mod credentials;
pub mod sts;

/// Credentials handed back to callers of the resolver
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Actual session expiration; `None` for static profile keys
    pub expiration: Option<SystemTime>,
    pub provider_name: &'static str,
}

impl Credentials {
    pub fn from_keys(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
            expiration: None,
            provider_name: PROVIDER_NAME,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("provider_name", &self.provider_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .field("expiration", &self.expiration.map(format_expiration))
            .finish()
    }
}

impl From<&SessionCredentials> for Credentials {
    fn from(session: &SessionCredentials) -> Self {
        Self {
            access_key_id: session.access_key_id.clone(),
            secret_access_key: session.secret_access_key.clone(),
            session_token: Some(session.session_token.clone()),
            expiration: Some(session.expiration),
            provider_name: PROVIDER_NAME,
        }
    }
}

/// Temporary credentials produced by a role assumption
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    #[serde(with = "expiration_format")]
    pub expiration: SystemTime,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &format_expiration(self.expiration))
            .finish()
    }
}

/// Identity STS reports for the assumed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumedRoleUser {
    pub assumed_role_id: String,
    pub arn: String,
}

/// Result of an AssumeRole exchange, laid out like the AWS CLI cache files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumeRoleOutput {
    pub credentials: SessionCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumed_role_user: Option<AssumedRoleUser>,
}

/// Format an instant as RFC 3339, the way STS and the AWS CLI cache do
pub fn format_expiration(time: SystemTime) -> String {
    DateTime::from(time)
        .fmt(Format::DateTime)
        .unwrap_or_else(|_| "unknown".to_string())
}

mod expiration_format {
    use std::time::SystemTime;

    use aws_smithy_types::{DateTime, date_time::Format};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = DateTime::from(*time)
            .fmt(Format::DateTime)
            .map_err(S::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // The AWS CLI writes "+00:00" offsets rather than "Z"
        let parsed = DateTime::from_str(&raw, Format::DateTime)
            .or_else(|_| DateTime::from_str(&raw, Format::DateTimeWithOffset))
            .map_err(D::Error::custom)?;
        SystemTime::try_from(parsed).map_err(D::Error::custom)
    }
}
