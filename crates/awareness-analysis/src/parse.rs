//! Provider response parsing.
//!
//! The chat endpoint wraps the model output in `answer` (some deployments
//! use `content`). Models often fence their JSON in markdown code blocks,
//! which are stripped before parsing.

use serde::Deserialize;

use awareness_core::types::FullAnalysis;

use crate::error::{ProviderError, Result};

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    answer: Option<serde_json::Value>,
    #[serde(default)]
    content: Option<serde_json::Value>,
}

/// Remove markdown code fence markers and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(trimmed)
        .trim()
}

/// Parse the model text into an analysis.
pub fn parse_analysis(text: &str) -> Result<FullAnalysis> {
    serde_json::from_str::<FullAnalysis>(strip_code_fences(text))
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Parse a full chat response body.
pub fn parse_response_body(body: &str) -> Result<FullAnalysis> {
    let message: ChatMessageResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("response body is not JSON: {e}")))?;

    // An empty `answer` falls through to `content`.
    let text = [message.answer, message.content]
        .into_iter()
        .flatten()
        .find_map(|v| match v {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .ok_or_else(|| ProviderError::Parse("response has no answer text".to_string()))?;

    parse_analysis(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = r#"{
        "summary": "Steady",
        "investorProfile": {
            "riskTolerance": "Medium",
            "investmentStyle": "Balanced",
            "timeHorizon": "Long",
            "emotionalPattern": "Rational"
        },
        "blindSpots": ["Anchoring"],
        "strengths": ["Discipline"],
        "recommendations": ["Review quarterly"],
        "fullAnalysis": "Details"
    }"#;

    fn body_with(field: &str, text: &str) -> String {
        serde_json::json!({ field: text, "conversation_id": "c-1" }).to_string()
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn parses_fenced_answer() {
        let fenced = format!("```json\n{ANALYSIS}\n```");
        let analysis = parse_response_body(&body_with("answer", &fenced)).unwrap();
        assert_eq!(analysis.summary, "Steady");
        assert_eq!(analysis.investor_profile.risk_tolerance, "Medium");
        assert_eq!(analysis.strengths, vec!["Discipline"]);
    }

    #[test]
    fn falls_back_to_content() {
        let body = serde_json::json!({ "answer": "", "content": ANALYSIS }).to_string();
        assert_eq!(parse_response_body(&body).unwrap().full_analysis, "Details");
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let text = r#"{"summary":"s","investorProfile":{"riskTolerance":"Low","investmentStyle":"Value","timeHorizon":"Short","emotionalPattern":"Mixed"},"fullAnalysis":"f"}"#;
        let analysis = parse_analysis(text).unwrap();
        assert!(analysis.blind_spots.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn rejects_prose_and_missing_fields() {
        let prose = body_with("answer", "I'm sorry, I cannot help with that.");
        assert!(matches!(parse_response_body(&prose), Err(ProviderError::Parse(_))));

        let partial = body_with("answer", r#"{"summary":"only"}"#);
        assert!(matches!(parse_response_body(&partial), Err(ProviderError::Parse(_))));

        assert!(matches!(
            parse_response_body(r#"{"event":"message"}"#),
            Err(ProviderError::Parse(_))
        ));
        assert!(matches!(parse_response_body("<html>"), Err(ProviderError::Parse(_))));
    }
}
