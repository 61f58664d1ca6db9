//! Resolution of a shared credentials profile into usable credentials.
//!
//! Static profiles resolve to their own keys and never expire. Profiles that
//! set `role_arn` are role chained: the resolver loads the source profile,
//! assumes the role with its keys and tracks when the resulting session has
//! to be refreshed. Sessions can optionally be cached through a
//! [`CacheProvider`] so repeated invocations skip the STS round trip.

use std::{
    fmt,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, info, warn};

use crate::{
    aws::{
        AssumeRoleOutput, Credentials,
        credentials::{CredentialsFile, Profile},
        sts::{AssumeRoleClient, AssumeRoleRequest, StsAssumeRoleClient},
    },
    cache::{CacheProvider, CacheStore, FileCacheProvider},
    clock::{Clock, SystemClock},
    config::{self, StsOptions},
    constants::{DEFAULT_DURATION, DEFAULT_PROFILE},
    error::{BoxError, CredentialsError},
};

#[derive(Debug, Clone, Copy, Default)]
struct ResolverState {
    retrieved: bool,
    /// Session expiration minus the expiry window; `None` for static keys
    expires_at: Option<SystemTime>,
}

/// Resolves credentials from the shared credentials file.
///
/// `retrieve` takes `&mut self`; share a resolver between threads by wrapping
/// it in a `Mutex` so only one refresh runs at a time.
pub struct SharedCredentialsResolver {
    filename: Option<PathBuf>,
    profile: Option<String>,
    cache: Option<Box<dyn CacheProvider>>,
    sts: StsOptions,
    client: Option<Box<dyn AssumeRoleClient>>,
    clock: Arc<dyn Clock>,
    state: ResolverState,
    cache_error: Option<CredentialsError>,
}

impl SharedCredentialsResolver {
    pub fn builder() -> SharedCredentialsResolverBuilder {
        SharedCredentialsResolverBuilder::default()
    }

    /// Load the active profile and turn it into credentials, assuming a role
    /// when the profile is role chained.
    pub fn retrieve(&mut self) -> Result<Credentials, CredentialsError> {
        self.state.retrieved = false;
        self.cache_error = None;

        let path = config::resolve_credentials_path(self.filename.as_ref())?;
        let profile_name = config::resolve_profile_name(self.profile.as_deref());
        let file = CredentialsFile::open(&path)?;
        let profile = file.load_profile(&profile_name)?;

        if !profile.is_role_chained() {
            info!("Using static credentials from profile {}", profile_name);
            self.state = ResolverState {
                retrieved: true,
                expires_at: None,
            };
            return Ok(profile.static_credentials());
        }

        let source_name = match profile.source_profile.as_deref() {
            Some(name) => name,
            None => {
                debug!(
                    "Profile {} has no source_profile, falling back to {}",
                    profile_name, DEFAULT_PROFILE
                );
                DEFAULT_PROFILE
            }
        };
        let source = file.load_profile(source_name)?;
        if source.is_role_chained() {
            return Err(CredentialsError::ChainedSourceProfile {
                profile: profile_name,
                source_profile: source.name,
                path,
            });
        }

        self.assume(&profile, &source)
    }

    /// Assume `role`'s role using the static keys of `source`.
    ///
    /// With caching enabled a fresh cached session is returned without calling
    /// STS, and a newly obtained session is written back to the cache.
    pub fn assume(
        &mut self,
        role: &Profile,
        source: &Profile,
    ) -> Result<Credentials, CredentialsError> {
        let role_arn = role
            .role_arn()
            .ok_or_else(|| CredentialsError::AssumeRoleFailure {
                profile: role.name.clone(),
                role_arn: String::new(),
                source: "profile does not set role_arn".into(),
            })?;

        if role.mfa_serial.is_some() {
            warn!(
                "Profile {} sets mfa_serial; MFA codes are not supported and will not be sent",
                role.name
            );
        }

        let configured_session_name = role.role_session_name.as_deref().unwrap_or_default();
        let role_session_name = match configured_session_name {
            "" => self.default_session_name(),
            name => name.to_string(),
        };

        // Zero means unset, both in the profile and in the options
        let duration = role
            .duration_seconds
            .map(|secs| Duration::from_secs(secs.into()))
            .into_iter()
            .chain([self.sts.duration])
            .find(|duration| !duration.is_zero())
            .unwrap_or(DEFAULT_DURATION);

        let request = AssumeRoleRequest {
            role_arn: role_arn.to_string(),
            role_session_name,
            duration_seconds: i32::try_from(duration.as_secs()).unwrap_or(i32::MAX),
            external_id: role.external_id.clone(),
            source_credentials: source.static_credentials(),
        };

        let mut cache_error = None;
        let output = match self.cache.as_deref() {
            Some(provider) => {
                let key = provider.cache_key(&source.name, role_arn, configured_session_name);
                let store = provider.store(&key);

                let now = self.clock.now();
                match read_fresh(store.as_ref(), &key, now, self.sts.expiry_window) {
                    Ok(Some(cached)) => cached,
                    result => {
                        if let Err(e) = result {
                            warn!("Ignoring unreadable cached session {}: {}", key, e);
                            cache_error = Some(e);
                        }
                        let output = request_session(&mut self.client, &role.name, &request)?;
                        if let Err(e) = store.set(&output) {
                            warn!("Failed to cache session {}: {}", key, e);
                            cache_error = Some(e);
                        }
                        output
                    }
                }
            }
            None => request_session(&mut self.client, &role.name, &request)?,
        };

        // Refresh proactively so callers never hold credentials that expire mid-request
        let expires_at = refresh_deadline(output.credentials.expiration, self.sts.expiry_window);

        self.state = ResolverState {
            retrieved: true,
            expires_at: Some(expires_at),
        };
        self.cache_error = cache_error;

        Ok(Credentials::from(&output.credentials))
    }

    /// True before the first successful retrieval, after a failed one, and once
    /// the session is within the expiry window of its expiration.
    pub fn is_expired(&self) -> bool {
        if !self.state.retrieved {
            return true;
        }
        self.state
            .expires_at
            .is_some_and(|expires_at| self.clock.now() >= expires_at)
    }

    /// Instant at which `is_expired` turns true; `None` for static credentials
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.state.expires_at.filter(|_| self.state.retrieved)
    }

    /// Cache failure from the most recent `retrieve`, if any.
    ///
    /// These never fail the retrieval itself.
    pub fn last_cache_error(&self) -> Option<&CredentialsError> {
        self.cache_error.as_ref()
    }

    fn default_session_name(&self) -> String {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default()
            .to_string()
    }
}

impl fmt::Debug for SharedCredentialsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCredentialsResolver")
            .field("filename", &self.filename)
            .field("profile", &self.profile)
            .field("cache", &self.cache)
            .field("sts", &self.sts)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn refresh_deadline(expiration: SystemTime, window: Duration) -> SystemTime {
    expiration.checked_sub(window).unwrap_or(UNIX_EPOCH)
}

/// `Ok(None)` when the store has nothing usable, `Err` when a fresh entry
/// could not be read back.
///
/// An entry already inside the expiry window counts as a miss.
fn read_fresh(
    store: &dyn CacheStore,
    key: &str,
    now: SystemTime,
    expiry_window: Duration,
) -> Result<Option<AssumeRoleOutput>, CredentialsError> {
    if store.is_expired() {
        debug!("Cache miss for {}", key);
        return Ok(None);
    }
    let cached = store.get()?;
    if now >= refresh_deadline(cached.credentials.expiration, expiry_window) {
        debug!("Cached session {} is inside the expiry window", key);
        return Ok(None);
    }
    info!("Using cached session {}", key);
    Ok(Some(cached))
}

fn request_session(
    client: &mut Option<Box<dyn AssumeRoleClient>>,
    profile: &str,
    request: &AssumeRoleRequest,
) -> Result<AssumeRoleOutput, CredentialsError> {
    let failure = |source: BoxError| CredentialsError::AssumeRoleFailure {
        profile: profile.to_string(),
        role_arn: request.role_arn.clone(),
        source,
    };

    if let Some(client) = client {
        return client.assume_role(request).map_err(failure);
    }

    let sts = StsAssumeRoleClient::new().map_err(|e| failure(e.into()))?;
    client
        .insert(Box::new(sts))
        .assume_role(request)
        .map_err(failure)
}

pub struct SharedCredentialsResolverBuilder {
    filename: Option<PathBuf>,
    profile: Option<String>,
    cache: bool,
    cache_provider: Option<Box<dyn CacheProvider>>,
    sts: StsOptions,
    client: Option<Box<dyn AssumeRoleClient>>,
    clock: Arc<dyn Clock>,
}

impl Default for SharedCredentialsResolverBuilder {
    fn default() -> Self {
        Self {
            filename: None,
            profile: None,
            cache: false,
            cache_provider: None,
            sts: StsOptions::default(),
            client: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl SharedCredentialsResolverBuilder {
    /// Credentials file to read instead of `AWS_SHARED_CREDENTIALS_FILE` or `~/.aws/credentials`
    pub fn filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Profile to resolve instead of `AWS_PROFILE` or `default`
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Reuse and store assumed sessions; off by default
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Where sessions are cached when caching is enabled; defaults to the AWS CLI cache
    pub fn cache_provider(mut self, provider: impl CacheProvider + 'static) -> Self {
        self.cache_provider = Some(Box::new(provider));
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.sts.duration = duration;
        self
    }

    pub fn expiry_window(mut self, window: Duration) -> Self {
        self.sts.expiry_window = window;
        self
    }

    pub fn sts_options(mut self, options: StsOptions) -> Self {
        self.sts = options;
        self
    }

    /// Client used for AssumeRole; an AWS SDK client is created on first use otherwise
    pub fn client(mut self, client: impl AssumeRoleClient + 'static) -> Self {
        self.client = Some(Box::new(client));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fails only when caching is enabled without a provider and the home
    /// directory for the default cache cannot be found.
    pub fn build(self) -> Result<SharedCredentialsResolver, CredentialsError> {
        let cache = match (self.cache, self.cache_provider) {
            (false, _) => None,
            (true, Some(provider)) => Some(provider),
            (true, None) => {
                let provider = FileCacheProvider::cli_default()?.with_clock(Arc::clone(&self.clock));
                debug!("Caching sessions in {}", provider.dir().display());
                Some(Box::new(provider) as Box<dyn CacheProvider>)
            }
        };

        Ok(SharedCredentialsResolver {
            filename: self.filename,
            profile: self.profile,
            cache,
            sts: self.sts,
            client: self.client,
            clock: self.clock,
            state: ResolverState::default(),
            cache_error: None,
        })
    }
}
