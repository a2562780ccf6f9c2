use async_trait::async_trait;
use std::sync::Arc;

use crate::config::CompletionConfig;
use crate::error::{MosesError, Result};
use crate::models::{ChatMessage, ChatRequest, FeedbackType, MosesContext};
use crate::transport::Transport;

const SYSTEM_PROMPT: &str = r#"You are Moses, a friendly bartender who recommends one drink at a time.
Write a short, warm recommendation for the guest described by the user message.
Rules:
- Put the name of the main drink in bold exactly once at first mention, like **Paloma**.
- Follow it with a recipe link in parentheses, like (https://example.com/paloma).
- You may suggest up to two alternatives, each name in bold with its own link.
- If the guest has had several drinks, add one line starting with "Safety tip:".
- End with a single line that sums up the vibe and starts with an emoji."#;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Send one context to the completion API and return its raw text.
    async fn request(&self, context: &MosesContext) -> Result<String>;
}

pub struct CompletionRequester {
    tx: Arc<dyn Transport>,
    model: String,
    temperature: f32,
    max_tokens: i32,
}

impl CompletionRequester {
    pub fn new(tx: Arc<dyn Transport>, cfg: &CompletionConfig) -> Self {
        Self {
            tx,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    fn build_request(&self, context: &MosesContext) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(render_user_prompt(context)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Recommender for CompletionRequester {
    async fn request(&self, context: &MosesContext) -> Result<String> {
        tracing::info!(
            "Requesting recommendation: alcohol={}, mood={}, feedback={}",
            context.alcohol_type,
            context.current_mood,
            context
                .previous_feedback
                .as_ref()
                .map(|f| f.kind.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let request = self.build_request(context);
        let response = self.tx.chat(&request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| MosesError::Upstream {
                status: 200,
                message: "Completion API returned empty choices".to_string(),
            })?;

        if content.trim().is_empty() {
            return Err(MosesError::Upstream {
                status: 200,
                message: "Completion API returned an empty message".to_string(),
            });
        }

        tracing::debug!("Received {} chars of recommendation text", content.len());
        Ok(content)
    }
}

/// Render the guest description sent as the user message.
pub fn render_user_prompt(context: &MosesContext) -> String {
    let mut prompt = format!(
        "Preferred alcohol: {}\nDrinks so far: {}\nFeeling: {}\nFlavor profile: {}\nMood: {}",
        context.alcohol_type,
        context.drinks_consumed,
        context.feeling,
        context.flavor_profile,
        context.current_mood,
    );

    if let Some(selfie) = &context.selfie_analysis {
        if let Some(emotion) = &selfie.dominant_emotion {
            prompt.push_str(&format!("\nSelfie reads as: {emotion}"));
        }
        if let Some(score) = selfie.similarity_score {
            prompt.push_str(&format!(" (match {score:.2})"));
        }
    }

    if let Some(seconds) = context.response_time {
        prompt.push_str(&format!("\nAnswered the questions in {seconds:.1}s"));
    }

    if let Some(feedback) = &context.previous_feedback {
        let last = feedback
            .last_suggestion
            .as_deref()
            .unwrap_or("the last suggestion");
        let line = match feedback.kind {
            FeedbackType::Positive => {
                format!("\nThey loved {last}. Suggest something in the same spirit.")
            }
            FeedbackType::Negative => {
                format!("\nThey did not like {last}. Suggest something clearly different.")
            }
            FeedbackType::Tweak => format!(
                "\nAdjust {last} with this request: {}",
                feedback.tweak_request.as_deref().unwrap_or("surprise me")
            ),
        };
        prompt.push_str(&line);
    }

    prompt
}
