//! Persistence for assumed role sessions.
//!
//! A [`CacheProvider`] maps a cache key to a [`CacheStore`], which holds at
//! most one [`AssumeRoleOutput`]. Keys are derived with [`cache_key`] so that
//! entries line up with the files the AWS CLI keeps in `~/.aws/cli/cache`.

use std::fmt::Debug;

use crate::{aws::AssumeRoleOutput, error::CredentialsError};

pub mod file;
pub mod memory;

pub use file::{FileCache, FileCacheProvider};
pub use memory::{MemoryCache, MemoryCacheProvider};

const KEY_SEPARATOR: &str = "--";

/// A single cached session.
pub trait CacheStore: Debug {
    /// Read whatever is persisted for this store's key.
    fn get(&self) -> Result<AssumeRoleOutput, CredentialsError>;

    /// Whether the stored entry is missing, unreadable or past its expiration.
    fn is_expired(&self) -> bool;

    /// Replace the stored entry.
    fn set(&self, output: &AssumeRoleOutput) -> Result<(), CredentialsError>;
}

pub trait CacheProvider: Debug + Send + Sync {
    fn store(&self, key: &str) -> Box<dyn CacheStore>;

    fn cache_key(&self, profile: &str, role_arn: &str, role_session_name: &str) -> String {
        cache_key(profile, role_arn, role_session_name)
    }
}

/// Build the cache key for a session.
///
/// Colons in the role ARN become underscores so the key is usable as a file
/// name; the session name is appended only when set.
///
/// The mapping is not injective: an ARN containing `_` where another has `:`
/// yields the same key, as does a profile or session name containing `--`.
/// Real IAM role ARNs never put `_` in the colon-delimited positions, so
/// entries only collide for hand-written keys.
pub fn cache_key(profile: &str, role_arn: &str, role_session_name: &str) -> String {
    let arn = role_arn.replace(':', "_");
    let mut key = [profile, arn.as_str()].join(KEY_SEPARATOR);
    if !role_session_name.is_empty() {
        key.push_str(KEY_SEPARATOR);
        key.push_str(role_session_name);
    }
    key
}
