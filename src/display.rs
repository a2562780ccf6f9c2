use async_trait::async_trait;
use url::Url;

use crate::context::ResponseTimer;
use crate::error::{MosesError, Result};
use crate::models::{DrinkRecommendation, FeedbackType, ParsedRecommendation, PreviousFeedback};
use crate::parser;
use crate::storage::LocalStorage;
use crate::store::StorageKey;

/// Platform capability for opening external links.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn can_open(&self, url: &str) -> bool;
    async fn open(&self, url: &str) -> Result<()>;
}

/// Desktop families with a known default-link handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(unix) {
            Some(Self::Unix)
        } else {
            None
        }
    }

    /// Program and arguments that hand `url` to the default handler. The URL
    /// is always a single argument and never passes through a shell.
    pub fn launch_command(&self, url: &str) -> (&'static str, Vec<String>) {
        match self {
            Self::MacOs => ("open", vec![url.to_string()]),
            Self::Windows => (
                "rundll32",
                vec!["url.dll,FileProtocolHandler".to_string(), url.to_string()],
            ),
            Self::Unix => ("xdg-open", vec![url.to_string()]),
        }
    }
}

/// Hands links to the desktop's default handler.
pub struct SystemUrlOpener;

#[async_trait]
impl UrlOpener for SystemUrlOpener {
    async fn can_open(&self, url: &str) -> bool {
        is_web_url(url) && Platform::current().is_some()
    }

    async fn open(&self, url: &str) -> Result<()> {
        let platform = Platform::current()
            .ok_or_else(|| MosesError::Internal("no URL handler on this platform".to_string()))?;
        let (program, args) = platform.launch_command(url);
        let status = tokio::process::Command::new(program)
            .args(&args)
            .status()
            .await
            .map_err(|e| MosesError::Internal(format!("Failed to launch {program}: {e}")))?;
        if !status.success() {
            return Err(MosesError::Internal(format!("{program} exited with {status}")));
        }
        Ok(())
    }
}

pub fn is_web_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Checks capability first; links the platform cannot handle are skipped. Returns
/// whether the link was opened.
pub async fn open_recipe(opener: &dyn UrlOpener, url: &str) -> bool {
    if url.is_empty() || !opener.can_open(url).await {
        tracing::debug!("Recipe link not openable, skipping: '{}'", url);
        return false;
    }
    match opener.open(url).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to open recipe link {}: {}", url, e);
            false
        }
    }
}

/// What the result screen shows: the raw text plus what could be pulled out of it.
#[derive(Debug, Clone)]
pub struct RecommendationView {
    pub raw_text: String,
    pub parsed: ParsedRecommendation,
}

impl RecommendationView {
    pub fn from_raw(raw_text: String) -> Self {
        let parsed = parser::parse(&raw_text);
        Self { raw_text, parsed }
    }

    /// Read the last recommendation back from storage.
    pub async fn load(storage: &LocalStorage) -> Option<Self> {
        storage
            .get(StorageKey::LastRecommendation)
            .await
            .map(Self::from_raw)
    }

    pub fn structured(&self) -> DrinkRecommendation {
        parser::parse_structured(&self.raw_text)
    }

    pub async fn open_recipe(&self, opener: &dyn UrlOpener) -> bool {
        open_recipe(opener, &self.parsed.recipe_url).await
    }

    /// Turn the user's reaction into feedback for the next round.
    pub fn feedback(&self, kind: FeedbackType, tweak_request: Option<String>) -> PreviousFeedback {
        PreviousFeedback {
            kind,
            last_suggestion: Some(self.parsed.drink_name.clone()),
            tweak_request: match kind {
                FeedbackType::Tweak => tweak_request,
                _ => None,
            },
        }
    }

    /// Start the questionnaire over; the returned timer measures the new round.
    pub fn restart(&self) -> ResponseTimer {
        tracing::info!("Restarting flow after '{}'", self.parsed.drink_name);
        ResponseTimer::start()
    }
}
