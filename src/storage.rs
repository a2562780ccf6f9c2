use std::sync::Arc;

use crate::store::{KeyValueStore, StorageKey};

/// Storage boundary used by the rest of the flow.
///
/// Failures of the underlying store are logged here and never cross this
/// type: reads degrade to `None`, writes and removals report `false`.
#[derive(Clone)]
pub struct LocalStorage {
    store: Arc<dyn KeyValueStore>,
}

impl LocalStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: StorageKey) -> Option<String> {
        match self.store.get(key.as_str()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read '{}' from local storage: {}", key, e);
                None
            }
        }
    }

    pub async fn set(&self, key: StorageKey, value: &str) -> bool {
        match self.store.set(key.as_str(), value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to write '{}' to local storage: {}", key, e);
                false
            }
        }
    }

    pub async fn remove(&self, key: StorageKey) -> bool {
        match self.store.remove(key.as_str()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to remove '{}' from local storage: {}", key, e);
                false
            }
        }
    }

    /// Read and decode a JSON value. Corrupt entries are logged and treated as absent.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring unreadable '{}' entry: {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: serde::Serialize + Sync>(&self, key: StorageKey, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw).await,
            Err(e) => {
                tracing::warn!("Failed to serialize '{}': {}", key, e);
                false
            }
        }
    }
}
