use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::{Client as StsClient, config::Credentials as SdkCredentials};
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tracing::{debug, info};

use super::{AssumeRoleOutput, AssumedRoleUser, Credentials, SessionCredentials};
use crate::{
    constants::{DEFAULT_AWS_REGION, PROVIDER_NAME},
    error::BoxError,
};

/// Parameters of a single AssumeRole call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_seconds: i32,
    pub external_id: Option<String>,
    /// Static credentials of the source profile used to sign the call
    pub source_credentials: Credentials,
}

/// The network half of role assumption.
///
/// Implementations perform one exchange per call; retries and timeouts are
/// theirs to own.
pub trait AssumeRoleClient: Send + Sync {
    fn assume_role(&self, request: &AssumeRoleRequest) -> Result<AssumeRoleOutput, BoxError>;
}

/// [`AssumeRoleClient`] backed by the AWS SDK.
///
/// Owns a current-thread tokio runtime and blocks on each request, so it must
/// not be called from within another tokio runtime.
pub struct StsAssumeRoleClient {
    runtime: Runtime,
    region: Option<Region>,
}

impl StsAssumeRoleClient {
    pub fn new() -> std::io::Result<Self> {
        let runtime = RuntimeBuilder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            region: None,
        })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(Region::new(region.into()));
        self
    }

    async fn call(&self, request: &AssumeRoleRequest) -> Result<AssumeRoleOutput, BoxError> {
        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", request.role_arn);
        debug!("Session name: {}", request.role_session_name);
        debug!("Duration: {} seconds", request.duration_seconds);

        let source = &request.source_credentials;
        let credentials = SdkCredentials::new(
            source.access_key_id.clone(),
            source.secret_access_key.clone(),
            source.session_token.clone(),
            None,
            PROVIDER_NAME,
        );

        // Priority: explicit region -> ENV vars / config file -> DEFAULT_AWS_REGION
        let config = {
            let mut loader =
                aws_config::defaults(BehaviorVersion::latest()).credentials_provider(credentials);
            if let Some(region) = &self.region {
                loader = loader.region(region.clone());
            }
            let loaded = loader.load().await;

            match loaded.region() {
                Some(region) => {
                    debug!("Using region: {}", region);
                    loaded
                }
                None => {
                    debug!(
                        "No region configured, using default {} for STS",
                        DEFAULT_AWS_REGION
                    );
                    loaded
                        .into_builder()
                        .region(Region::new(DEFAULT_AWS_REGION))
                        .build()
                }
            }
        };

        let client = StsClient::new(&config);

        let response = client
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.role_session_name)
            .duration_seconds(request.duration_seconds)
            .set_external_id(request.external_id.clone())
            .send()
            .await?;

        let sts_creds = response
            .credentials()
            .ok_or("AWS STS returned no credentials")?;

        let expiration = std::time::SystemTime::try_from(*sts_creds.expiration())?;

        let output = AssumeRoleOutput {
            credentials: SessionCredentials {
                access_key_id: sts_creds.access_key_id().to_string(),
                secret_access_key: sts_creds.secret_access_key().to_string(),
                session_token: sts_creds.session_token().to_string(),
                expiration,
            },
            assumed_role_user: response.assumed_role_user().map(|user| AssumedRoleUser {
                assumed_role_id: user.assumed_role_id().to_string(),
                arn: user.arn().to_string(),
            }),
        };

        info!("Successfully obtained AWS credentials");
        Ok(output)
    }
}

impl AssumeRoleClient for StsAssumeRoleClient {
    fn assume_role(&self, request: &AssumeRoleRequest) -> Result<AssumeRoleOutput, BoxError> {
        self.runtime.block_on(self.call(request))
    }
}

impl std::fmt::Debug for StsAssumeRoleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsAssumeRoleClient")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
