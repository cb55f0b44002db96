//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap the JSON payload in prose or code fences, so the payload
//! is located by its outermost brackets before deserializing.

use crate::error::{Error, Result};
use crate::models::AIInsight;

/// Shorten a raw response for error messages
fn truncate(raw: &str) -> String {
    const MAX: usize = 200;
    match raw.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &raw[..idx]),
        None => raw.to_string(),
    }
}

/// Parse a list of insights from an AI response
///
/// Entries with a blank title or message are dropped. An unknown `type` or a
/// missing field makes the whole reply invalid.
pub fn parse_insights(response: &str) -> Result<Vec<AIInsight>> {
    let response = response.trim();

    let start = response.find('[');
    let end = response.rfind(']');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            let insights: Vec<AIInsight> = serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid insights JSON from AI: {} | Raw: {}",
                    e,
                    truncate(json_str)
                ))
            })?;

            Ok(insights
                .into_iter()
                .filter(|i| !i.title.trim().is_empty() && !i.message.trim().is_empty())
                .collect())
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON array found in AI response | Raw: {}",
            truncate(response)
        ))),
    }
}
