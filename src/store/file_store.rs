use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::{CredentialKey, CredentialPair, CredentialStore};
use crate::errors::StoreError;

type Entries = BTreeMap<String, String>;

/// Keeps the credential pair in a small JSON object on disk, so a session
/// survives restarts of the client.
///
/// The file is re-read on every access; writes replace it atomically via a
/// sibling temp file and a rename.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, StoreError> {
        match fs::read(&self.path) {
            Ok(raw) if raw.is_empty() => Ok(Entries::new()),
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Persisted credentials to '{}'", self.path.display());
        Ok(())
    }

    /// Read-modify-write under the process-local write lock.
    fn update(&self, f: impl FnOnce(&mut Entries)) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A corrupt file is replaced rather than blocking every future login.
        let mut entries = self.load().unwrap_or_else(|e| {
            warn!("Discarding unreadable credential file '{}': {}", self.path.display(), e);
            Entries::new()
        });
        f(&mut entries);
        self.persist(&entries)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        match self.load() {
            Ok(mut entries) => entries.remove(key.as_str()),
            Err(e) => {
                warn!(
                    "Failed to read credential file '{}': {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn set(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(CredentialKey::Access.to_string(), pair.access.clone());
            entries.insert(CredentialKey::Refresh.to_string(), pair.refresh.clone());
        })
    }

    fn set_access(&self, access: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(CredentialKey::Access.to_string(), access.to_string());
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn get_name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let store = FileStore::new(&path);
        store.set(&CredentialPair::new("access-1", "refresh-1")).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.access().as_deref(), Some("access-1"));
        assert_eq!(reopened.refresh().as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_file_store_uses_fixed_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileStore::new(&path)
            .set(&CredentialPair::new("a", "r"))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["accessToken"], "a");
        assert_eq!(raw["refreshToken"], "r");
    }

    #[test]
    fn test_set_access_keeps_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("credentials.json"));
        store.set(&CredentialPair::new("a1", "r1")).unwrap();
        store.set_access("a2").unwrap();
        assert_eq!(store.access().as_deref(), Some("a2"));
        assert_eq!(store.refresh().as_deref(), Some("r1"));
    }

    #[test]
    fn test_clear_removes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileStore::new(&path);
        store.set(&CredentialPair::new("a", "r")).unwrap();

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(!store.has_session());
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_reads_as_absent_and_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, b"{not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.access(), None);

        store.set(&CredentialPair::new("a", "r")).unwrap();
        assert_eq!(store.access().as_deref(), Some("a"));
    }
}
