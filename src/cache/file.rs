use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{CacheProvider, CacheStore};
use crate::{
    aws::AssumeRoleOutput,
    clock::{Clock, SystemClock},
    constants,
    error::{BoxError, CredentialsError},
};

/// Hands out one JSON file per cache key under a base directory
#[derive(Debug, Clone)]
pub struct FileCacheProvider {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCacheProvider {
    /// Cache under `dir`; a leading `~/` is expanded against the home directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CredentialsError> {
        let dir = dir.into();
        let dir = match dir.strip_prefix("~") {
            Ok(rest) => constants::home_dir()?.join(rest),
            Err(_) => dir,
        };
        Ok(Self {
            dir,
            clock: Arc::new(SystemClock),
        })
    }

    /// Share the AWS CLI's cache directory, `~/.aws/cli/cache`
    pub fn cli_default() -> Result<Self, CredentialsError> {
        Self::new(constants::default_cache_dir()?)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CacheProvider for FileCacheProvider {
    fn store(&self, key: &str) -> Box<dyn CacheStore> {
        Box::new(FileCache {
            path: self.dir.join(file_name(key)),
            clock: Arc::clone(&self.clock),
        })
    }
}

/// Map a cache key to a single file name inside the cache directory.
///
/// Role ARNs may carry a path (`role/team/Ops`), so separators are
/// percent-encoded; `%` itself is encoded first to keep the mapping one to one.
fn file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + ".json".len());
    for c in key.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            c => name.push(c),
        }
    }
    name.push_str(".json");
    name
}

#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_failure(&self, source: impl Into<BoxError>) -> CredentialsError {
        CredentialsError::CacheReadFailure {
            location: self.path.display().to_string(),
            source: source.into(),
        }
    }

    fn write_failure(&self, source: impl Into<BoxError>) -> CredentialsError {
        CredentialsError::CacheWriteFailure {
            location: self.path.display().to_string(),
            source: source.into(),
        }
    }

    fn write_atomically(&self, data: &[u8]) -> Result<(), CredentialsError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| self.write_failure("cache path has no parent directory"))?;
        fs::create_dir_all(dir).map_err(|e| self.write_failure(e))?;

        // Readers only ever see a complete file: write beside the target, then rename
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_failure(e))?;
        tmp.write_all(data).map_err(|e| self.write_failure(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_failure(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
                .map_err(|e| self.write_failure(e))?;
        }

        tmp.persist(&self.path)
            .map_err(|e| self.write_failure(e.error))?;
        Ok(())
    }
}

impl CacheStore for FileCache {
    fn get(&self) -> Result<AssumeRoleOutput, CredentialsError> {
        let data = fs::read(&self.path).map_err(|e| self.read_failure(e))?;
        serde_json::from_slice(&data).map_err(|e| self.read_failure(e))
    }

    fn is_expired(&self) -> bool {
        match self.get() {
            Ok(output) => {
                let expired = self.clock.now() >= output.credentials.expiration;
                debug!(
                    "Cached session {} is {}",
                    self.path.display(),
                    if expired { "expired" } else { "fresh" }
                );
                expired
            }
            Err(e) => {
                debug!("No usable cached session: {e}");
                true
            }
        }
    }

    fn set(&self, output: &AssumeRoleOutput) -> Result<(), CredentialsError> {
        let data = serde_json::to_vec_pretty(output).map_err(|e| self.write_failure(e))?;
        self.write_atomically(&data)?;
        info!("Cached session written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aws::{AssumedRoleUser, SessionCredentials},
        clock::ManualClock,
    };
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn output(expiration: SystemTime) -> AssumeRoleOutput {
        AssumeRoleOutput {
            credentials: SessionCredentials {
                access_key_id: "ASIACACHED".to_string(),
                secret_access_key: "cached-secret".to_string(),
                session_token: "cached-token".to_string(),
                expiration,
            },
            assumed_role_user: Some(AssumedRoleUser {
                assumed_role_id: "AROACACHED:session".to_string(),
                arn: "arn:aws:sts::123456789012:assumed-role/X/session".to_string(),
            }),
        }
    }

    fn provider(dir: &Path, clock: &ManualClock) -> FileCacheProvider {
        FileCacheProvider::new(dir)
            .unwrap()
            .with_clock(Arc::new(clock.clone()))
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let store = provider(dir.path(), &clock).store("default--role_X--s");

        let expected = output(start() + Duration::from_secs(900));
        store.set(&expected).unwrap();

        assert_eq!(store.get().unwrap(), expected);
        assert!(dir.path().join("default--role_X--s.json").exists());
    }

    #[test]
    fn test_set_creates_missing_directory_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cli").join("cache");
        let clock = ManualClock::new(start());
        let store = provider(&cache_dir, &clock).store("key");

        store.set(&output(start())).unwrap();
        store
            .set(&output(start() + Duration::from_secs(60)))
            .unwrap();

        let entries: Vec<_> = fs::read_dir(&cache_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("key.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        provider(dir.path(), &clock)
            .store("key")
            .set(&output(start()))
            .unwrap();

        let mode = fs::metadata(dir.path().join("key.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_entry_is_expired() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let store = provider(dir.path(), &clock).store("absent");

        assert!(store.is_expired());
        assert!(matches!(
            store.get(),
            Err(CredentialsError::CacheReadFailure { .. })
        ));
    }

    #[test]
    fn test_freshness_follows_expiration() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let store = provider(dir.path(), &clock).store("key");
        store
            .set(&output(start() + Duration::from_secs(900)))
            .unwrap();

        assert!(!store.is_expired());

        clock.advance(Duration::from_secs(899));
        assert!(!store.is_expired());

        clock.advance(Duration::from_secs(1));
        assert!(store.is_expired());
    }

    #[test]
    fn test_corrupt_entry_is_expired() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("key.json"), b"{not json").unwrap();
        let clock = ManualClock::new(start());
        let store = provider(dir.path(), &clock).store("key");

        assert!(store.is_expired());
        assert!(matches!(
            store.get(),
            Err(CredentialsError::CacheReadFailure { .. })
        ));
    }

    #[test]
    fn test_role_path_stays_in_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(start());
        let key = crate::cache::cache_key("default", "arn:aws:iam::1:role/team/Ops", "");
        let store = provider(dir.path(), &clock).store(&key);

        store.set(&output(start() + Duration::from_secs(900))).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].file_type().unwrap().is_file());
        assert_eq!(
            entries[0].file_name(),
            "default--arn_aws_iam__1_role%2Fteam%2FOps.json"
        );
        assert!(!store.is_expired());
    }

    #[test]
    fn test_key_cannot_escape_cache_directory() {
        let root = tempfile::tempdir().unwrap();
        let cache_dir = root.path().join("cli").join("cache");
        let clock = ManualClock::new(start());
        let store = provider(&cache_dir, &clock).store("../../escape--r");

        store.set(&output(start() + Duration::from_secs(900))).unwrap();

        assert_eq!(fs::read_dir(&cache_dir).unwrap().count(), 1);
        assert!(cache_dir.join("..%2F..%2Fescape--r.json").exists());
        assert!(!root.path().join("escape--r.json").exists());
    }

    #[test]
    fn test_file_names_keep_distinct_keys_apart() {
        assert_eq!(file_name("a/b"), "a%2Fb.json");
        assert_eq!(file_name("a%2Fb"), "a%252Fb.json");
        assert_eq!(file_name("a\\b"), "a%5Cb.json");
    }

    #[test]
    fn test_reads_entries_written_by_aws_cli() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("key.json"),
            r#"{"Credentials": {"AccessKeyId": "ASIACLI", "SecretAccessKey": "s",
                "SessionToken": "t", "Expiration": "2023-11-14T22:28:20+00:00"}}"#,
        )
        .unwrap();
        let clock = ManualClock::new(start());
        let store = provider(dir.path(), &clock).store("key");

        assert!(!store.is_expired());
        let cached = store.get().unwrap();
        assert_eq!(cached.credentials.access_key_id, "ASIACLI");
        assert_eq!(cached.assumed_role_user, None);
    }
}
