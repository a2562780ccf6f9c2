use chrono::{DateTime, SecondsFormat, Utc};

use crate::storage::LocalStorage;
use crate::store::StorageKey;

/// Stamp `current_session_start` for this launch. Returns the stamp when it
/// was persisted.
pub async fn record_session_start(storage: &LocalStorage) -> Option<DateTime<Utc>> {
    let now = Utc::now();
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    if storage.set(StorageKey::CurrentSessionStart, &stamp).await {
        tracing::info!("Session started at {}", stamp);
        Some(now)
    } else {
        None
    }
}

/// Read the session stamp back. Unparseable stamps read as absent.
pub async fn session_start(storage: &LocalStorage) -> Option<DateTime<Utc>> {
    let raw = storage.get(StorageKey::CurrentSessionStart).await?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| tracing::warn!("Ignoring malformed session stamp '{}': {}", raw, e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_session_start_is_iso8601() {
        let store = Arc::new(MemoryStore::new());
        let storage = LocalStorage::new(store.clone());

        let recorded = record_session_start(&storage).await.unwrap();
        let raw = storage.get(StorageKey::CurrentSessionStart).await.unwrap();
        assert!(raw.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&raw).is_ok());

        let read = session_start(&storage).await.unwrap();
        assert_eq!(read.timestamp_millis(), recorded.timestamp_millis());
    }

    #[tokio::test]
    async fn test_failed_write_reports_none() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let storage = LocalStorage::new(store);
        assert!(record_session_start(&storage).await.is_none());
        assert!(session_start(&storage).await.is_none());
    }
}
