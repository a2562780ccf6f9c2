//! Lightweight extraction over free-form completion text.
//!
//! Nothing here fails: when a marker is missing the documented default is
//! returned instead.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{DrinkRecommendation, DrinkSuggestion, ParsedRecommendation, VibeSummary};

/// Drink name shown when the text carries no `**bold**` span.
pub const PLACEHOLDER_DRINK_NAME: &str = "Your Perfect Drink";
pub const DEFAULT_VIBE_EMOJI: &str = "🍹";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));
static PAREN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((https?://[^)]+)\)").expect("url pattern is valid"));
static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("fence pattern is valid")
});

/// Extract the drink name and recipe link.
pub fn parse(raw: &str) -> ParsedRecommendation {
    ParsedRecommendation {
        drink_name: extract_drink_name(raw).unwrap_or_else(|| PLACEHOLDER_DRINK_NAME.to_string()),
        recipe_url: extract_recipe_url(raw).unwrap_or_default(),
    }
}

pub fn extract_drink_name(raw: &str) -> Option<String> {
    BOLD.captures(raw).map(|c| c[1].to_string())
}

pub fn extract_recipe_url(raw: &str) -> Option<String> {
    PAREN_URL.captures(raw).map(|c| c[1].to_string())
}

/// Best-effort structured parse.
///
/// A JSON document (bare or inside a fenced block) matching
/// [`DrinkRecommendation`] wins. Otherwise the shape is assembled from the
/// markdown markers, with the scalar [`parse`] result as the main drink.
pub fn parse_structured(raw: &str) -> DrinkRecommendation {
    if let Some(rec) = parse_json(raw) {
        return rec;
    }

    let scalar = parse(raw);
    let bolds: Vec<_> = BOLD.captures_iter(raw).collect();
    let urls: Vec<_> = PAREN_URL.captures_iter(raw).collect();

    let mut alternatives = Vec::new();
    for (i, cap) in bolds.iter().enumerate().skip(1) {
        let span_end = cap.get(0).map(|m| m.end()).unwrap_or_default();
        let next_start = bolds
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(raw.len());
        let recipe_url = urls.iter().find_map(|u| {
            let m = u.get(0)?;
            (m.start() >= span_end && m.start() < next_start).then(|| u[1].to_string())
        });
        alternatives.push(DrinkSuggestion {
            name: cap[1].to_string(),
            reasoning: String::new(),
            recipe_url,
        });
    }

    let plain = strip_markers(raw);
    let lines: Vec<&str> = plain.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let safety_tip = lines
        .iter()
        .find(|l| {
            let lower = l.to_lowercase();
            lower.starts_with("safety") || lower.starts_with("tip:")
        })
        .map(|l| l.to_string());

    let emoji = raw
        .chars()
        .find(|c| is_emoji(*c))
        .map(|c| c.to_string())
        .unwrap_or_else(|| DEFAULT_VIBE_EMOJI.to_string());

    DrinkRecommendation {
        main_drink: DrinkSuggestion {
            name: scalar.drink_name,
            reasoning: plain.trim().to_string(),
            recipe_url: (!scalar.recipe_url.is_empty()).then_some(scalar.recipe_url),
        },
        alternatives,
        safety_tip,
        vibe_summary: VibeSummary {
            emoji,
            description: lines.last().map(|l| l.to_string()).unwrap_or_default(),
        },
    }
}

fn parse_json(raw: &str) -> Option<DrinkRecommendation> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        if let Ok(rec) = serde_json::from_str(trimmed) {
            return Some(rec);
        }
    }
    let fenced = JSON_FENCE.captures(raw)?;
    serde_json::from_str(&fenced[1]).ok()
}

/// Drop bold markers and parenthesized links, keeping the prose.
fn strip_markers(raw: &str) -> String {
    let without_links = PAREN_URL.replace_all(raw, "");
    BOLD.replace_all(&without_links, "$1").into_owned()
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32, 0x1F300..=0x1FAFF | 0x2600..=0x27BF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_name_and_url() {
        let parsed = parse("Try a **Paloma** (https://example.com/paloma)! 🍹");
        assert_eq!(parsed.drink_name, "Paloma");
        assert_eq!(parsed.recipe_url, "https://example.com/paloma");
    }

    #[test]
    fn test_parse_uses_first_bold_span() {
        let parsed = parse("**Negroni** or maybe **Boulevardier**");
        assert_eq!(parsed.drink_name, "Negroni");
    }

    #[test]
    fn test_parse_defaults_without_markers() {
        let parsed = parse("Have a glass of water and call it a night.");
        assert_eq!(parsed.drink_name, PLACEHOLDER_DRINK_NAME);
        assert_eq!(parsed.recipe_url, "");
        assert!(!parsed.has_recipe());
    }

    #[test]
    fn test_parse_empty_text() {
        let parsed = parse("");
        assert_eq!(parsed.drink_name, PLACEHOLDER_DRINK_NAME);
        assert!(parsed.recipe_url.is_empty());
    }

    #[test]
    fn test_parse_ignores_unclosed_bold_and_bare_urls() {
        let parsed = parse("**Mojito is great, see https://example.com/mojito");
        assert_eq!(parsed.drink_name, PLACEHOLDER_DRINK_NAME);
        assert_eq!(parsed.recipe_url, "");
    }

    #[test]
    fn test_parse_accepts_plain_http() {
        let parsed = parse("See (ftp://nope) then (http://example.com/a?b=1) and (https://x.y)");
        assert_eq!(parsed.recipe_url, "http://example.com/a?b=1");
    }

    #[test]
    fn test_structured_from_markdown() {
        let raw = "Try a **Paloma** (https://example.com/paloma) for that sour kick.\n\
                   Or a **Margarita** (https://example.com/margarita).\n\
                   Or a **Ranch Water**.\n\
                   Safety tip: alternate with water.\n\
                   🌅 Sunset on a patio.";
        let rec = parse_structured(raw);

        assert_eq!(rec.main_drink.name, "Paloma");
        assert_eq!(
            rec.main_drink.recipe_url.as_deref(),
            Some("https://example.com/paloma")
        );
        assert_eq!(rec.alternatives.len(), 2);
        assert_eq!(rec.alternatives[0].name, "Margarita");
        assert_eq!(
            rec.alternatives[0].recipe_url.as_deref(),
            Some("https://example.com/margarita")
        );
        assert_eq!(rec.alternatives[1].name, "Ranch Water");
        assert!(rec.alternatives[1].recipe_url.is_none());
        assert_eq!(rec.safety_tip.as_deref(), Some("Safety tip: alternate with water."));
        assert_eq!(rec.vibe_summary.emoji, "🌅");
        assert_eq!(rec.vibe_summary.description, "🌅 Sunset on a patio.");
        assert!(!rec.main_drink.reasoning.contains("**"));
    }

    #[test]
    fn test_structured_safety_tip_needs_label() {
        let raw = "Tipsy already? A **Michelada** keeps it light.\nTip: eat something first.";
        let rec = parse_structured(raw);
        assert_eq!(rec.safety_tip.as_deref(), Some("Tip: eat something first."));

        let rec = parse_structured("Tipsy already? Go with a **Shandy**.");
        assert!(rec.safety_tip.is_none());
    }

    #[test]
    fn test_structured_from_fenced_json() {
        let raw = "Here you go:\n```json\n{\"mainDrink\":{\"name\":\"Spritz\",\"reasoning\":\"light\"},\
                   \"alternatives\":[],\"vibeSummary\":{\"emoji\":\"☀\",\"description\":\"Sunny\"}}\n```";
        let rec = parse_structured(raw);
        assert_eq!(rec.main_drink.name, "Spritz");
        assert_eq!(rec.vibe_summary.description, "Sunny");
    }

    #[test]
    fn test_structured_defaults_on_plain_text() {
        let rec = parse_structured("Nothing special tonight");
        assert_eq!(rec.main_drink.name, PLACEHOLDER_DRINK_NAME);
        assert!(rec.main_drink.recipe_url.is_none());
        assert!(rec.alternatives.is_empty());
        assert!(rec.safety_tip.is_none());
        assert_eq!(rec.vibe_summary.emoji, DEFAULT_VIBE_EMOJI);
        assert_eq!(rec.vibe_summary.description, "Nothing special tonight");
    }
}
