//! Client-local key/value storage.
//!
//! The credential is the only durable client state. It lives behind the
//! [`KeyValueStorage`] trait so the session logic does not care whether it
//! is kept in memory (tests, short-lived tools) or in a file on disk.
//!
//! Storage handles can publish [`StorageEvent`]s when *another* handle
//! writes a key, mirroring browser storage events between tabs. The session
//! listens to these to stay consistent across tabs.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of per-handle event channels.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A change made to storage by another handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed.
    pub key: String,
    /// New value, or `None` when the key was removed.
    pub new_value: Option<String>,
}

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a JSON object of strings.
    #[error("storage format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Synchronous string key/value storage.
pub trait KeyValueStorage: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to changes made through other handles.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}
