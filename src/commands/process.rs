use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::aws::{Credentials, format_expiration};

/// Output version required by the AWS `credential_process` protocol
const CREDENTIAL_PROCESS_VERSION: u8 = 1;

#[derive(Debug, Clone, Args)]
pub struct ProcessCommand {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessOutput<'a> {
    version: u8,
    access_key_id: &'a str,
    secret_access_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<String>,
}

impl ProcessCommand {
    pub fn render(&self, credentials: &Credentials) -> Result<String> {
        let output = ProcessOutput {
            version: CREDENTIAL_PROCESS_VERSION,
            access_key_id: &credentials.access_key_id,
            secret_access_key: &credentials.secret_access_key,
            session_token: credentials.session_token.as_deref(),
            expiration: credentials.expiration.map(format_expiration),
        };
        serde_json::to_string_pretty(&output).context("Failed to serialize credentials")
    }
}
