//! Thread-safe credentials that refresh themselves when they expire.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::{Credentials, CredentialsError, SharedCredentialsResolver};

#[derive(Debug)]
struct Inner {
    resolver: SharedCredentialsResolver,
    value: Option<Credentials>,
    force_refresh: bool,
}

/// Wraps a resolver so callers can ask for credentials without tracking
/// expiry themselves.
///
/// `get` returns the last retrieved credentials until the resolver reports
/// them expired, and only then calls `retrieve` again. The resolver is
/// behind a mutex, so concurrent callers share a single refresh.
#[derive(Debug)]
pub struct SharedCredentials {
    inner: Mutex<Inner>,
}

impl SharedCredentials {
    pub fn new(resolver: SharedCredentialsResolver) -> Self {
        Self {
            inner: Mutex::new(Inner {
                resolver,
                value: None,
                force_refresh: false,
            }),
        }
    }

    /// Current credentials, retrieving new ones first if needed.
    ///
    /// A failed refresh drops the held value so the next call retries.
    pub fn get(&self) -> Result<Credentials, CredentialsError> {
        let mut inner = self.lock();

        if !inner.force_refresh && !inner.resolver.is_expired() {
            if let Some(value) = &inner.value {
                return Ok(value.clone());
            }
        }

        debug!("Refreshing credentials");
        inner.value = None;
        let credentials = inner.resolver.retrieve()?;
        inner.value = Some(credentials.clone());
        inner.force_refresh = false;
        Ok(credentials)
    }

    /// Force the next `get` to retrieve new credentials.
    pub fn expire(&self) {
        self.lock().force_refresh = true;
    }

    /// True when the next `get` will retrieve new credentials.
    pub fn is_expired(&self) -> bool {
        let inner = self.lock();
        inner.value.is_none() || inner.force_refresh || inner.resolver.is_expired()
    }

    pub fn into_inner(self) -> SharedCredentialsResolver {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .resolver
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<SharedCredentialsResolver> for SharedCredentials {
    fn from(resolver: SharedCredentialsResolver) -> Self {
        Self::new(resolver)
    }
}
