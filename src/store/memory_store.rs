use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{CredentialKey, CredentialPair, CredentialStore};
use crate::errors::StoreError;

/// A process-local store, mostly useful for tests and one-shot commands.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CredentialKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds a session.
    pub fn with_pair(pair: &CredentialPair) -> Self {
        let store = Self::new();
        store.write(|entries| {
            entries.insert(CredentialKey::Access, pair.access.clone());
            entries.insert(CredentialKey::Refresh, pair.refresh.clone());
        });
        store
    }

    fn write(&self, f: impl FnOnce(&mut HashMap<CredentialKey, String>)) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut entries);
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn set(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.write(|entries| {
            entries.insert(CredentialKey::Access, pair.access.clone());
            entries.insert(CredentialKey::Refresh, pair.refresh.clone());
        });
        Ok(())
    }

    fn set_access(&self, access: &str) -> Result<(), StoreError> {
        self.write(|entries| {
            entries.insert(CredentialKey::Access, access.to_string());
        });
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write(HashMap::clear);
        Ok(())
    }

    fn get_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryStore::new();
        assert!(!store.has_session());

        store.set(&CredentialPair::new("a1", "r1")).unwrap();
        assert_eq!(store.access().as_deref(), Some("a1"));
        assert_eq!(store.refresh().as_deref(), Some("r1"));

        store.set_access("a2").unwrap();
        assert_eq!(store.access().as_deref(), Some("a2"));
        assert_eq!(store.refresh().as_deref(), Some("r1"));

        store.clear().unwrap();
        assert_eq!(store.access(), None);
        assert_eq!(store.refresh(), None);
    }
}
