use clap::Args;

use crate::aws::{Credentials, format_expiration};

#[derive(Debug, Clone, Args)]
pub struct ExportCommand {}

impl ExportCommand {
    /// Render POSIX shell statements that put the credentials in the environment
    pub fn render(&self, credentials: &Credentials) -> String {
        let mut lines = vec![
            export("AWS_ACCESS_KEY_ID", &credentials.access_key_id),
            export("AWS_SECRET_ACCESS_KEY", &credentials.secret_access_key),
        ];

        // Clear a stale token left over from a previous session
        lines.push(match &credentials.session_token {
            Some(token) => export("AWS_SESSION_TOKEN", token),
            None => "unset AWS_SESSION_TOKEN".to_string(),
        });

        if let Some(expiration) = credentials.expiration {
            lines.push(export(
                "AWS_CREDENTIAL_EXPIRATION",
                &format_expiration(expiration),
            ));
        }

        lines.join("\n")
    }
}

fn export(name: &str, value: &str) -> String {
    format!("export {name}='{}'", value.replace('\'', r"'\''"))
}
