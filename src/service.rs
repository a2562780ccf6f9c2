use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{Config, StorageBackend};
use crate::display::RecommendationView;
use crate::error::Result;
use crate::models::MosesContext;
use crate::profile::{ProfileBackend, ProfileSync, RestProfileBackend};
use crate::requester::{CompletionRequester, Recommender};
use crate::session;
use crate::storage::LocalStorage;
use crate::store::{KeyValueStore, MemoryStore, RedisStore, StorageKey};
use crate::transport::{HttpTransport, Transport};

/// Drives one install's recommendation flow: request, persist, read back.
pub struct MosesService {
    storage: LocalStorage,
    recommender: Arc<dyn Recommender>,
    profiles: ProfileSync,
}

impl MosesService {
    /// Wire the service from configuration. An unreachable Redis degrades to
    /// process-local storage rather than failing.
    pub async fn new(config: &Config) -> Result<Self> {
        tracing::info!("Service::new() - Starting initialization");

        let store: Arc<dyn KeyValueStore> = match config.storage.backend {
            StorageBackend::Redis => match RedisStore::new_with_config(config).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!(
                        "Redis unavailable ({}); falling back to in-memory storage for this run",
                        e
                    );
                    Arc::new(MemoryStore::new())
                }
            },
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; nothing will survive this process");
                Arc::new(MemoryStore::new())
            }
        };
        let storage = LocalStorage::new(store);

        let transport = Arc::new(HttpTransport::new(&config.completion)?);
        let recommender = Arc::new(CompletionRequester::new(
            transport as Arc<dyn Transport>,
            &config.completion,
        ));

        let backend: Option<Arc<dyn ProfileBackend>> = if config.has_backend() {
            Some(Arc::new(RestProfileBackend::new(&config.backend)?))
        } else {
            tracing::info!("Service::new() - No profile backend configured; profiles stay local");
            None
        };
        let profiles = ProfileSync::new(storage.clone(), backend);

        tracing::info!("Service::new() - Service initialization complete");
        Ok(Self::with_parts(storage, recommender, profiles))
    }

    pub fn with_parts(
        storage: LocalStorage,
        recommender: Arc<dyn Recommender>,
        profiles: ProfileSync,
    ) -> Self {
        Self {
            storage,
            recommender,
            profiles,
        }
    }

    /// Stamp the session start for this launch.
    pub async fn start_session(&self) -> Option<DateTime<Utc>> {
        session::record_session_start(&self.storage).await
    }

    /// Request a recommendation and persist its raw text.
    ///
    /// Completion errors propagate and leave the stored recommendation
    /// untouched. A failed write is logged; the fresh result is still returned.
    pub async fn recommend(&self, context: &MosesContext) -> Result<RecommendationView> {
        let raw = self.recommender.request(context).await?;

        if !self.storage.set(StorageKey::LastRecommendation, &raw).await {
            tracing::warn!("Recommendation not cached; it will not survive a restart");
        }

        let view = RecommendationView::from_raw(raw);
        tracing::info!("Recommended '{}'", view.parsed.drink_name);
        Ok(view)
    }

    pub async fn last_recommendation(&self) -> Option<RecommendationView> {
        RecommendationView::load(&self.storage).await
    }

    pub fn profiles(&self) -> &ProfileSync {
        &self.profiles
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }
}
