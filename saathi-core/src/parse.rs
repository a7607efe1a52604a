//! Model output parsing.
//!
//! Gemini frequently wraps JSON replies in markdown code fences. [`parse_response`]
//! strips one level of fencing and parses the remainder. A failure is returned as
//! a [`ParseFailure`] value carrying the raw text, never as a panic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("unparsable model output: {error}")]
#[serde(rename_all = "camelCase")]
pub struct ParseFailure {
    pub error: String,
    pub raw_content: String,
}

/// Remove a single surrounding markdown fence (```` ```json ```` or ```` ``` ````).
///
/// Text without a leading fence is returned trimmed and otherwise untouched.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse raw model text into a JSON value.
pub fn parse_response(text: &str) -> Result<serde_json::Value, ParseFailure> {
    let body = strip_fences(text);
    serde_json::from_str(body).map_err(|e| ParseFailure {
        error: e.to_string(),
        raw_content: text.to_string(),
    })
}

/// Parse raw model text straight into a typed result.
///
/// A well-formed JSON document that does not match `T` is treated the same
/// as malformed JSON.
pub fn parse_typed<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ParseFailure> {
    let value = parse_response(text)?;
    serde_json::from_value(value).map_err(|e| ParseFailure {
        error: format!("unexpected shape: {}", e),
        raw_content: text.to_string(),
    })
}

/// Slice from the first `{` to the last `}`, for replies with prose around the JSON.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_parses() {
        let v = parse_response(r#"  {"title": "Fractions"}  "#).unwrap();
        assert_eq!(v, json!({"title": "Fractions"}));
    }

    #[test]
    fn test_json_fence_is_stripped() {
        let text = "```json\n{\"title\": \"Fractions\", \"count\": 3}\n```";
        let v = parse_response(text).unwrap();
        assert_eq!(v["count"], 3);
    }

    #[test]
    fn test_bare_fence_is_stripped() {
        let text = "```\n[1, 2, 3]\n```\n";
        let v = parse_response(text).unwrap();
        assert_eq!(v, json!([1, 2, 3]));
    }

    #[test]
    fn test_uppercase_language_tag() {
        let v = parse_response("```JSON\n{\"a\": 1}\n```").unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_fence_stripping_is_idempotent() {
        let inner = r#"{"questions": [{"question": "What is 1/2 + 1/4?"}], "title": "Quiz"}"#;
        let fenced = format!("```json\n{}\n```", inner);

        let from_fenced = parse_response(&fenced).unwrap();
        let from_stripped = parse_response(strip_fences(&fenced)).unwrap();
        let from_inner = parse_response(inner).unwrap();

        assert_eq!(from_fenced, from_stripped);
        assert_eq!(from_fenced, from_inner);
        assert_eq!(strip_fences(strip_fences(&fenced)), strip_fences(&fenced));
    }

    #[test]
    fn test_invalid_json_returns_parse_failure() {
        let text = "Here is your lesson plan: it covers fractions.";
        let err = parse_response(text).unwrap_err();
        assert_eq!(err.raw_content, text);
        assert!(!err.error.is_empty());
    }

    #[test]
    fn test_unterminated_fence_still_parses_body() {
        let v = parse_response("```json\n{\"ok\": true}").unwrap();
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn test_parse_typed_shape_mismatch_is_failure() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            title: String,
        }

        let err = parse_typed::<Needs>(r#"{"name": "x"}"#).unwrap_err();
        assert!(err.error.starts_with("unexpected shape"));
    }

    #[test]
    fn test_parse_failure_serializes_camel_case() {
        let failure = ParseFailure {
            error: "eof".to_string(),
            raw_content: "{".to_string(),
        };
        let v = serde_json::to_value(&failure).unwrap();
        assert_eq!(v["rawContent"], "{");
    }

    #[test]
    fn test_extract_json_object() {
        let text = "Evaluation follows.\n{\"overall_score\": 90}\nThanks!";
        assert_eq!(extract_json_object(text), Some("{\"overall_score\": 90}"));
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
