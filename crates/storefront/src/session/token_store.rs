//! Persisted credential access.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::broadcast;

use crate::storage::{KeyValueStorage, StorageError, StorageEvent};

/// Storage key holding the bearer credential.
pub const CREDENTIAL_KEY: &str = "authToken";

/// Sole owner of the persisted credential.
///
/// A thin get/set/clear wrapper over [`KeyValueStorage`]; it does not cache,
/// so every read reflects what another tab may have written.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Read the stored credential.
    ///
    /// A storage read failure is logged and treated as "no credential".
    #[must_use]
    pub fn get(&self) -> Option<SecretString> {
        match self.storage.get(CREDENTIAL_KEY) {
            Ok(value) => value.filter(|t| !t.is_empty()).map(SecretString::from),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored credential");
                None
            }
        }
    }

    /// Persist a credential, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn set(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(CREDENTIAL_KEY, token)
    }

    /// Delete the stored credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(CREDENTIAL_KEY)
    }

    /// Subscribe to storage changes made by other handles.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.storage.subscribe()
    }

    /// Whether a storage event concerns the credential.
    #[must_use]
    pub fn is_credential_event(event: &StorageEvent) -> bool {
        event.key == CREDENTIAL_KEY
    }
}
