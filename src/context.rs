//! Assembles a [`MosesContext`] from what the input screens collected.

use std::time::{Duration, Instant};

use crate::models::{DrinksConsumed, FeedbackType, MosesContext, PreviousFeedback, SelfieAnalysis};

/// Required answers from the questionnaire.
#[derive(Debug, Clone)]
pub struct ContextInputs {
    pub alcohol_type: String,
    pub drinks_consumed: DrinksConsumed,
    pub feeling: String,
    pub flavor_profile: String,
    pub current_mood: String,
}

/// Build a context. Pure and infallible; absent optionals stay absent.
pub fn build(
    inputs: ContextInputs,
    selfie_analysis: Option<SelfieAnalysis>,
    response_time: Option<f64>,
    previous_feedback: Option<PreviousFeedback>,
) -> MosesContext {
    MosesContext {
        alcohol_type: inputs.alcohol_type,
        drinks_consumed: inputs.drinks_consumed,
        feeling: inputs.feeling,
        flavor_profile: inputs.flavor_profile,
        current_mood: inputs.current_mood,
        selfie_analysis,
        response_time,
        previous_feedback,
    }
}

impl PreviousFeedback {
    pub fn positive(last_suggestion: impl Into<String>) -> Self {
        Self {
            kind: FeedbackType::Positive,
            last_suggestion: Some(last_suggestion.into()),
            tweak_request: None,
        }
    }

    pub fn negative(last_suggestion: impl Into<String>) -> Self {
        Self {
            kind: FeedbackType::Negative,
            last_suggestion: Some(last_suggestion.into()),
            tweak_request: None,
        }
    }

    pub fn tweak(last_suggestion: impl Into<String>, tweak_request: impl Into<String>) -> Self {
        Self {
            kind: FeedbackType::Tweak,
            last_suggestion: Some(last_suggestion.into()),
            tweak_request: Some(tweak_request.into()),
        }
    }
}

/// Measures the response-time hint: how long the user took on a screen.
#[derive(Debug, Clone, Copy)]
pub struct ResponseTimer {
    started: Instant,
}

impl ResponseTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed seconds, the unit the context carries.
    pub fn seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ContextInputs {
        ContextInputs {
            alcohol_type: "tequila".to_string(),
            drinks_consumed: 2u32.into(),
            feeling: "relaxed".to_string(),
            flavor_profile: "sour".to_string(),
            current_mood: "happy".to_string(),
        }
    }

    #[test]
    fn test_build_without_optionals() {
        let ctx = build(inputs(), None, None, None);
        assert_eq!(ctx.alcohol_type, "tequila");
        assert_eq!(ctx.drinks_consumed.to_string(), "2");
        assert!(ctx.selfie_analysis.is_none());
        assert!(ctx.response_time.is_none());
        assert!(ctx.previous_feedback.is_none());
    }

    #[test]
    fn test_build_carries_enrichments() {
        let selfie = SelfieAnalysis {
            dominant_emotion: Some("happy".to_string()),
            similarity_score: Some(0.82),
        };
        let ctx = build(
            inputs(),
            Some(selfie.clone()),
            Some(3.4),
            Some(PreviousFeedback::tweak("Paloma", "make it spicy")),
        );
        assert_eq!(ctx.selfie_analysis, Some(selfie));
        assert_eq!(ctx.response_time, Some(3.4));
        let fb = ctx.previous_feedback.unwrap();
        assert_eq!(fb.kind, FeedbackType::Tweak);
        assert_eq!(fb.tweak_request.as_deref(), Some("make it spicy"));
    }

    #[test]
    fn test_drinks_consumed_text_is_not_validated() {
        let mut i = inputs();
        i.drinks_consumed = "lost count".into();
        let ctx = build(i, None, None, None);
        assert_eq!(ctx.drinks_consumed.to_string(), "lost count");
    }

    #[test]
    fn test_response_timer_is_monotonic() {
        let timer = ResponseTimer::start();
        assert!(timer.seconds() >= 0.0);
    }
}
