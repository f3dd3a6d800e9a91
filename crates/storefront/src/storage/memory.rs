//! In-memory storage shared between handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{EVENT_CHANNEL_CAPACITY, KeyValueStorage, StorageError, StorageEvent};

/// In-memory storage.
///
/// Every handle returned by [`MemoryStorage::tab`] sees the same entries but
/// only receives events for writes made through a *different* handle, the
/// way a browser tab is not notified of its own storage writes.
pub struct MemoryStorage {
    shared: Arc<Shared>,
    origin: Uuid,
    events: broadcast::Sender<StorageEvent>,
}

#[derive(Default)]
struct Shared {
    entries: RwLock<HashMap<String, String>>,
    listeners: Mutex<Vec<(Uuid, broadcast::Sender<StorageEvent>)>>,
}

impl MemoryStorage {
    /// Create an empty storage with a single handle.
    #[must_use]
    pub fn new() -> Self {
        Self::attach(Arc::new(Shared::default()))
    }

    /// Open another handle onto the same entries.
    #[must_use]
    pub fn tab(&self) -> Self {
        Self::attach(Arc::clone(&self.shared))
    }

    fn attach(shared: Arc<Shared>) -> Self {
        let origin = Uuid::new_v4();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((origin, events.clone()));
        Self {
            shared,
            origin,
            events,
        }
    }

    fn publish(&self, key: &str, new_value: Option<&str>) {
        let listeners = self
            .shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (origin, sender) in listeners.iter().filter(|(o, _)| *o != self.origin) {
            // No subscriber on that handle is fine
            if sender
                .send(StorageEvent {
                    key: key.to_string(),
                    new_value: new_value.map(str::to_string),
                })
                .is_err()
            {
                tracing::trace!(%origin, key, "no storage listener on handle");
            }
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(origin, _)| *origin != self.origin);
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .shared
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self
            .shared
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.publish(key, Some(value));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let previous = self
            .shared
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if previous.is_some() {
            self.publish(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
