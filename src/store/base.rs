use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::StoreConfig;
use crate::errors::StoreError;

/// The two fixed keys the credential pair is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    Access,
    Refresh,
}

impl CredentialKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::Access => "accessToken",
            CredentialKey::Refresh => "refreshToken",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access and refresh token, as handed out by the login endpoint.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Tokens are secrets; keep them out of logs.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Synchronous key-value storage for the credential pair.
///
/// Absence of a key means "unauthenticated". Reads never fail: a backend that
/// cannot read its medium reports the key as absent.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Option<String>;
    fn set(&self, pair: &CredentialPair) -> Result<(), StoreError>;
    /// Overwrite only the access token, leaving the refresh token untouched.
    fn set_access(&self, access: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;

    fn get_name(&self) -> &str;

    fn access(&self) -> Option<String> {
        self.get(CredentialKey::Access)
    }

    fn refresh(&self) -> Option<String> {
        self.get(CredentialKey::Refresh)
    }

    /// Both halves of the pair are present.
    fn has_session(&self) -> bool {
        self.access().is_some() && self.refresh().is_some()
    }
}

/// Creates a concrete store implementation based on the StoreConfig.
pub fn create_store(config: &StoreConfig) -> Arc<dyn CredentialStore> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory credential store; sessions end with the process.");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::File(file_config) => {
            info!("Using file credential store at '{}'", file_config.path);
            Arc::new(FileStore::new(&file_config.path))
        }
    }
}
