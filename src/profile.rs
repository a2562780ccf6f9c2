//! Keeps the user profile in step between local storage and the hosted
//! backend.
//!
//! The backend only accepts canonical hyphenated UUIDs as identifiers.
//! Profiles carrying any other identifier (older installs generated their
//! own) stay local-only until the user resets and onboards again.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::error::{MosesError, Result};
use crate::models::{ProfileDraft, UserProfile};
use crate::storage::LocalStorage;
use crate::store::StorageKey;

pub const RESET_MESSAGE: &str =
    "Your profile has been reset. Please go through onboarding again to create a new one.";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn fetch_profile(&self, id: &str) -> Result<Option<UserProfile>>;
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()>;
}

/// Hosted database reached through its REST interface.
pub struct RestProfileBackend {
    client: Client,
    table_url: String,
    api_key: String,
}

impl RestProfileBackend {
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        if cfg.url.is_empty() {
            return Err(MosesError::Config("backend url is not configured".to_string()));
        }
        Ok(Self {
            client: Client::new(),
            table_url: format!(
                "{}/rest/v1/{}",
                cfg.url.trim_end_matches('/'),
                cfg.profile_table
            ),
            api_key: cfg.api_key.clone(),
        })
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[async_trait]
impl ProfileBackend for RestProfileBackend {
    async fn fetch_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        let response = self
            .authorized(self.client.get(&self.table_url))
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| MosesError::Backend(format!("Failed to fetch profile: {e}")))?;

        if !response.status().is_success() {
            return Err(MosesError::Backend(format!(
                "Profile fetch returned {}",
                response.status()
            )));
        }

        let rows: Vec<UserProfile> = response
            .json()
            .await
            .map_err(|e| MosesError::Backend(format!("Failed to decode profile: {e}")))?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let response = self
            .authorized(self.client.post(&self.table_url))
            .header("Prefer", "resolution=merge-duplicates")
            .json(profile)
            .send()
            .await
            .map_err(|e| MosesError::Backend(format!("Failed to upsert profile: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MosesError::Backend(format!(
                "Profile upsert returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// Where the current profile lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    NoProfile,
    /// Identifier the backend will not accept; kept in local storage only.
    Local(UserProfile),
    Backend(UserProfile),
}

impl ProfileState {
    fn classify(profile: UserProfile) -> Self {
        if is_backend_id(&profile.id) {
            Self::Backend(profile)
        } else {
            Self::Local(profile)
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::NoProfile => None,
            Self::Local(p) | Self::Backend(p) => Some(p),
        }
    }

    pub fn is_local_only(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    /// False when the storage removal itself failed (already logged).
    pub removed: bool,
    pub message: &'static str,
}

/// True for the identifier shape the backend requires: a canonical,
/// hyphenated UUID.
pub fn is_backend_id(id: &str) -> bool {
    id.len() == 36 && Uuid::try_parse(id).is_ok()
}

pub struct ProfileSync {
    storage: LocalStorage,
    backend: Option<Arc<dyn ProfileBackend>>,
}

impl ProfileSync {
    pub fn new(storage: LocalStorage, backend: Option<Arc<dyn ProfileBackend>>) -> Self {
        Self { storage, backend }
    }

    /// Read the persisted profile and classify it. Backend profiles are
    /// refreshed from the backend when it is reachable.
    pub async fn load(&self) -> ProfileState {
        let Some(local) = self.storage.get_json::<UserProfile>(StorageKey::UserProfile).await
        else {
            return ProfileState::NoProfile;
        };

        if !is_backend_id(&local.id) {
            tracing::info!("Profile {} is local-only (identifier not accepted by backend)", local.id);
            return ProfileState::Local(local);
        }

        if let Some(backend) = &self.backend {
            match backend.fetch_profile(&local.id).await {
                Ok(Some(remote)) => {
                    self.storage.set_json(StorageKey::UserProfile, &remote).await;
                    return ProfileState::Backend(remote);
                }
                Ok(None) => tracing::debug!("Profile {} not on backend yet", local.id),
                Err(e) => tracing::warn!("Using cached profile {}: {}", local.id, e),
            }
        }
        ProfileState::Backend(local)
    }

    /// Create a profile with a freshly issued identifier.
    pub async fn create(&self, draft: ProfileDraft) -> ProfileState {
        let profile = UserProfile::from_draft(Uuid::new_v4().to_string(), draft);
        self.save(&profile).await;
        ProfileState::Backend(profile)
    }

    /// Store a profile under an identifier issued elsewhere, which may not
    /// satisfy the backend.
    pub async fn adopt(&self, id: impl Into<String>, draft: ProfileDraft) -> ProfileState {
        let profile = UserProfile::from_draft(id.into(), draft);
        self.save(&profile).await;
        ProfileState::classify(profile)
    }

    /// Persist profile updates. Backend-format identifiers go to the backend
    /// and are cached locally; anything else is written locally only.
    pub async fn save(&self, profile: &UserProfile) -> bool {
        let mut profile = profile.clone();
        profile.updated_at = Utc::now();

        if is_backend_id(&profile.id) {
            match &self.backend {
                Some(backend) => {
                    if let Err(e) = backend.upsert_profile(&profile).await {
                        tracing::warn!(
                            "Backend sync failed for profile {}: {} - keeping local copy",
                            profile.id,
                            e
                        );
                    }
                }
                None => tracing::debug!("No profile backend configured; caching {} locally", profile.id),
            }
        } else {
            tracing::info!("Saving local-only profile {}", profile.id);
        }

        self.storage.set_json(StorageKey::UserProfile, &profile).await
    }

    /// Delete the persisted profile unconditionally.
    pub async fn reset(&self) -> ResetOutcome {
        let removed = self.storage.remove(StorageKey::UserProfile).await;
        tracing::info!("Profile reset requested (removed: {})", removed);
        ResetOutcome {
            removed,
            message: RESET_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn storage() -> LocalStorage {
        LocalStorage::new(Arc::new(MemoryStore::new()))
    }

    fn draft() -> ProfileDraft {
        ProfileDraft {
            name: Some("Sam".to_string()),
            favorite_alcohol: Some("tequila".to_string()),
            flavor_profile: None,
        }
    }

    #[test]
    fn test_backend_id_format() {
        assert!(is_backend_id("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(!is_backend_id("67e5504410b1426f9247bb680e5fe0c8"));
        assert!(!is_backend_id("user_1697040000000_ab12cd"));
        assert!(!is_backend_id(""));
    }

    #[tokio::test]
    async fn test_no_profile_initially() {
        let sync = ProfileSync::new(storage(), None);
        assert_eq!(sync.load().await, ProfileState::NoProfile);
    }

    #[tokio::test]
    async fn test_legacy_id_stays_local() {
        let mut backend = MockProfileBackend::new();
        backend.expect_upsert_profile().never();
        backend.expect_fetch_profile().never();

        let sync = ProfileSync::new(storage(), Some(Arc::new(backend)));
        let state = sync.adopt("user_1697040000000_ab12cd", draft()).await;
        assert!(state.is_local_only());

        let loaded = sync.load().await;
        assert!(loaded.is_local_only());
        assert_eq!(loaded.profile().unwrap().name.as_deref(), Some("Sam"));
    }

    #[tokio::test]
    async fn test_create_syncs_to_backend() {
        let mut backend = MockProfileBackend::new();
        backend
            .expect_upsert_profile()
            .withf(|p| is_backend_id(&p.id))
            .times(1)
            .returning(|_| Ok(()));
        backend.expect_fetch_profile().returning(|_| Ok(None));

        let sync = ProfileSync::new(storage(), Some(Arc::new(backend)));
        let state = sync.create(draft()).await;
        let id = state.profile().unwrap().id.clone();
        assert!(matches!(state, ProfileState::Backend(_)));

        match sync.load().await {
            ProfileState::Backend(p) => assert_eq!(p.id, id),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_local_copy() {
        let mut backend = MockProfileBackend::new();
        backend
            .expect_upsert_profile()
            .returning(|_| Err(MosesError::Backend("offline".to_string())));
        backend
            .expect_fetch_profile()
            .returning(|_| Err(MosesError::Backend("offline".to_string())));

        let sync = ProfileSync::new(storage(), Some(Arc::new(backend)));
        let created = sync.create(draft()).await;
        let loaded = sync.load().await;
        assert_eq!(
            loaded.profile().map(|p| p.id.clone()),
            created.profile().map(|p| p.id.clone())
        );
    }

    #[tokio::test]
    async fn test_reset_then_new_profile() {
        let sync = ProfileSync::new(storage(), None);
        sync.adopt("legacy-id", draft()).await;

        let outcome = sync.reset().await;
        assert!(outcome.removed);
        assert_eq!(outcome.message, RESET_MESSAGE);
        assert_eq!(sync.load().await, ProfileState::NoProfile);

        let state = sync.create(ProfileDraft::default()).await;
        assert!(matches!(state, ProfileState::Backend(_)));
    }

    #[tokio::test]
    async fn test_reset_without_profile_is_harmless() {
        let sync = ProfileSync::new(storage(), None);
        assert!(sync.reset().await.removed);
        assert_eq!(sync.load().await, ProfileState::NoProfile);
    }
}
