//! Response normalization
//!
//! Providers are asked for JSON but answer in free-form text. Parsing is
//! attempted in order: the whole response as JSON, then the first fenced
//! code block, then the first embedded object carrying a `priority` key.
//! When everything fails a default record is synthesized; normalization
//! never fails.

use serde::Deserialize;

use crate::types::{Analysis, EmailData, Tier};

/// How much of an unparseable response survives as the summary
const FALLBACK_SUMMARY_CHARS: usize = 200;

/// The analysis fields a provider is asked to produce, before the scraped
/// email is merged back in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    priority: Tier,
    #[serde(default)]
    priority_reason: String,
    #[serde(default)]
    sender_importance: Tier,
    #[serde(default)]
    importance_reason: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    action_items: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
}

impl RawAnalysis {
    fn into_analysis(self, email: &EmailData) -> Analysis {
        Analysis {
            priority: self.priority,
            priority_reason: self.priority_reason,
            sender_importance: self.sender_importance,
            importance_reason: self.importance_reason,
            summary: self.summary,
            action_items: self.action_items,
            categories: self.categories,
            email_data: email.clone(),
        }
    }
}

/// Coerce a provider's response text into an [`Analysis`], merging in the
/// scraped email. Infallible: unparseable text yields the default record.
pub fn normalize_response(text: &str, email: &EmailData) -> Analysis {
    match parse_raw(text) {
        Some(raw) => raw.into_analysis(email),
        None => fallback(text, email),
    }
}

fn parse_raw(text: &str) -> Option<RawAnalysis> {
    let trimmed = text.trim();

    if let Ok(raw) = serde_json::from_str::<RawAnalysis>(trimmed) {
        return Some(raw);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(raw) = serde_json::from_str::<RawAnalysis>(block) {
            return Some(raw);
        }
    }

    embedded_object(trimmed)
}

/// Contents of the first fenced code block, language tag stripped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // The fence line may carry a language tag ("json")
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First embedded JSON object containing a `priority` key.
///
/// Each `{` starts a candidate; `serde_json`'s stream deserializer parses
/// one value from the prefix and ignores trailing prose.
fn embedded_object(text: &str) -> Option<RawAnalysis> {
    for (idx, _) in text.match_indices('{') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[idx..]).into_iter::<serde_json::Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.get("priority").is_some() {
                if let Ok(raw) = serde_json::from_value::<RawAnalysis>(value) {
                    return Some(raw);
                }
            }
        }
    }
    None
}

/// Default record when nothing in the response parses.
fn fallback(text: &str, email: &EmailData) -> Analysis {
    let mut summary: String = text.trim().chars().take(FALLBACK_SUMMARY_CHARS).collect();
    if summary.len() < text.trim().len() {
        summary.push_str("...");
    }

    tracing::warn!(
        sender = %email.sender,
        "Classifier response was not parseable; using default record"
    );

    Analysis {
        priority: Tier::Medium,
        priority_reason: "Automatic default: the classifier response could not be parsed"
            .to_string(),
        sender_importance: Tier::Medium,
        importance_reason: "No structured importance assessment was returned".to_string(),
        summary,
        action_items: vec![],
        categories: vec!["General".to_string()],
        email_data: email.clone(),
    }
}
