use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much the user has had so far. The input screens hand over either a
/// number or free text ("a few"), and both are carried through as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DrinksConsumed {
    Count(serde_json::Number),
    Text(String),
}

impl From<u32> for DrinksConsumed {
    fn from(n: u32) -> Self {
        Self::Count(n.into())
    }
}

impl From<&str> for DrinksConsumed {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for DrinksConsumed {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl fmt::Display for DrinksConsumed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Result handed back by the selfie vision analysis, when one ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfieAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Positive,
    Negative,
    Tweak,
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Tweak => "tweak",
        })
    }
}

/// One prior round of feedback, carried into the next request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousFeedback {
    #[serde(rename = "type")]
    pub kind: FeedbackType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweak_request: Option<String>,
}

/// Everything sent to the completion API for a single recommendation.
///
/// A plain carrier: nothing here is cross-validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MosesContext {
    pub alcohol_type: String,
    pub drinks_consumed: DrinksConsumed,
    pub feeling: String,
    pub flavor_profile: String,
    pub current_mood: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selfie_analysis: Option<SelfieAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_feedback: Option<PreviousFeedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrinkSuggestion {
    pub name: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeSummary {
    pub emoji: String,
    pub description: String,
}

/// Target shape of a full recommendation. Only ever built in memory; the
/// raw completion text is what gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrinkRecommendation {
    pub main_drink: DrinkSuggestion,
    #[serde(default)]
    pub alternatives: Vec<DrinkSuggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_tip: Option<String>,
    pub vibe_summary: VibeSummary,
}

/// The two fields the parser always produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedRecommendation {
    pub drink_name: String,
    pub recipe_url: String,
}

impl ParsedRecommendation {
    pub fn has_recipe(&self) -> bool {
        !self.recipe_url.is_empty()
    }
}

/// Profile blob kept under `user_profile` and mirrored to the hosted backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub favorite_alcohol: Option<String>,
    #[serde(default)]
    pub flavor_profile: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-editable part of a profile, used when creating or adopting one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: Option<String>,
    pub favorite_alcohol: Option<String>,
    pub flavor_profile: Option<String>,
}

impl UserProfile {
    pub fn from_draft(id: String, draft: ProfileDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: draft.name,
            favorite_alcohol: draft.favorite_alcohol,
            flavor_profile: draft.flavor_profile,
            created_at: now,
            updated_at: now,
        }
    }
}

// OpenAI-compatible chat message format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// Chat completions request format
#[derive(Debug, Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: i32,
}

// Chat completions response format
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}
