use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{CacheProvider, CacheStore};
use crate::{
    aws::AssumeRoleOutput,
    clock::{Clock, SystemClock},
    error::CredentialsError,
};

type Entries = Arc<Mutex<HashMap<String, AssumeRoleOutput>>>;

/// Process-local cache; clones share their entries
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    entries: Entries,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCacheProvider {
    fn default() -> Self {
        Self {
            entries: Entries::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl MemoryCacheProvider {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn entry(&self, key: &str) -> Option<AssumeRoleOutput> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, output: AssumeRoleOutput) {
        lock(&self.entries).insert(key.into(), output);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheProvider for MemoryCacheProvider {
    fn store(&self, key: &str) -> Box<dyn CacheStore> {
        Box::new(MemoryCache {
            key: key.to_string(),
            entries: Arc::clone(&self.entries),
            clock: Arc::clone(&self.clock),
        })
    }
}

#[derive(Debug)]
pub struct MemoryCache {
    key: String,
    entries: Entries,
    clock: Arc<dyn Clock>,
}

impl CacheStore for MemoryCache {
    fn get(&self) -> Result<AssumeRoleOutput, CredentialsError> {
        lock(&self.entries)
            .get(&self.key)
            .cloned()
            .ok_or_else(|| CredentialsError::CacheReadFailure {
                location: format!("memory:{}", self.key),
                source: "no cached session".into(),
            })
    }

    fn is_expired(&self) -> bool {
        lock(&self.entries)
            .get(&self.key)
            .is_none_or(|output| self.clock.now() >= output.credentials.expiration)
    }

    fn set(&self, output: &AssumeRoleOutput) -> Result<(), CredentialsError> {
        lock(&self.entries).insert(self.key.clone(), output.clone());
        Ok(())
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, AssumeRoleOutput>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
