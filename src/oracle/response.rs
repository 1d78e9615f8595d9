//! Lenient parsing of oracle responses
//!
//! Responses are expected to carry a JSON object, either in a fenced code
//! block or inline. Anything unparsable degrades to free-text reasoning with
//! a default confidence instead of failing the round.

use crate::tools::ToolCall;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Confidence assumed for an unparsable first-round response
pub const ROUND_ONE_DEFAULT_CONFIDENCE: u8 = 90;
/// Confidence assumed for an unparsable later-round response
pub const ROUND_N_DEFAULT_CONFIDENCE: u8 = 95;

const CONFIDENCE_KEYS: &[&str] = &["confidence", "confidence_score"];
const COMPLEXITY_KEYS: &[&str] = &["complexity", "query_complexity"];
const REASONING_KEYS: &[&str] = &["reasoning", "analysis", "explanation"];
const TOOL_CALL_KEYS: &[&str] = &["tool_calls", "tools", "actions"];
const KEEP_KEYS: &[&str] = &["keep_files", "keep", "files_to_keep"];
const SELECTION_KEYS: &[&str] = &["files", "selected_files", "relevant_files"];

/// One round's assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundResult {
    pub round: usize,
    /// Clamped to 0..=100
    pub confidence: u8,
    /// Query complexity estimate (round 1 only)
    pub complexity: Option<u8>,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
    pub keep_files: Option<Vec<String>>,
    /// False when the response carried no usable JSON
    pub structured: bool,
}

/// Locate the JSON payload in a completion
///
/// Prefers the first fenced code block whose body parses as JSON, then the
/// first balanced `{...}` span (brace depth, ignoring braces in strings).
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(block) = first_fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Some(value);
        }
    }

    first_balanced_object(text).and_then(|span| serde_json::from_str(span).ok())
}

fn first_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the info string (e.g. `json`)
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn default_confidence(round: usize) -> u8 {
    if round <= 1 {
        ROUND_ONE_DEFAULT_CONFIDENCE
    } else {
        ROUND_N_DEFAULT_CONFIDENCE
    }
}

/// Result used when a response carries no usable JSON: the raw text becomes
/// the reasoning, confidence takes the round's default, no tool calls
pub fn fallback_round_result(text: &str, round: usize) -> RoundResult {
    RoundResult {
        round,
        confidence: default_confidence(round),
        complexity: None,
        reasoning: text.trim().to_string(),
        tool_calls: Vec::new(),
        keep_files: None,
        structured: false,
    }
}

/// Parse an assessment response. Never fails.
pub fn parse_round_result(text: &str, round: usize) -> RoundResult {
    let Some(Value::Object(object)) = extract_json(text) else {
        warn!("Round {} response has no JSON object, using text fallback", round);
        return fallback_round_result(text, round);
    };

    let confidence = first_value(&object, CONFIDENCE_KEYS)
        .and_then(percentage)
        .unwrap_or_else(|| default_confidence(round));
    let complexity = first_value(&object, COMPLEXITY_KEYS).and_then(percentage);
    let reasoning = first_value(&object, REASONING_KEYS)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_calls = first_value(&object, TOOL_CALL_KEYS)
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| match serde_json::from_value::<ToolCall>(call.clone()) {
                    Ok(call) => Some(call),
                    Err(e) => {
                        warn!("Ignoring malformed tool call {}: {}", call, e);
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let keep_files = first_value(&object, KEEP_KEYS).and_then(string_list);

    RoundResult {
        round,
        confidence,
        complexity,
        reasoning,
        tool_calls,
        keep_files,
        structured: true,
    }
}

/// Parse a narrowing response into the selected file list
///
/// Accepts `{"files": [...]}` (or `selected_files` / `relevant_files`) and a
/// bare JSON array. Returns `None` when no list can be found.
pub fn parse_file_selection(text: &str) -> Option<Vec<String>> {
    let fenced_array = first_fenced_block(text)
        .and_then(|block| serde_json::from_str::<Value>(block.trim()).ok())
        .filter(Value::is_array);

    match fenced_array.or_else(|| extract_json(text)) {
        Some(Value::Object(object)) => first_value(&object, SELECTION_KEYS).and_then(string_list),
        Some(array @ Value::Array(_)) => string_list(&array),
        _ => {
            let trimmed = text.trim();
            serde_json::from_str::<Value>(trimmed)
                .ok()
                .as_ref()
                .and_then(string_list)
        }
    }
}

fn first_value<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

/// Number or numeric string, clamped to 0..=100
fn percentage(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, 100.0) as u8)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"confidence\": 80}\n```\nthanks";
        let value = extract_json(text).unwrap();
        assert_eq!(value["confidence"], 80);
    }

    #[test]
    fn test_extract_balanced_braces_with_strings() {
        let text = r#"Sure. {"reasoning": "uses } and { inside", "confidence": 70} trailing }"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["confidence"], 70);
        assert_eq!(value["reasoning"], "uses } and { inside");
    }

    #[test]
    fn test_extract_handles_escaped_quotes() {
        let text = r#"{"reasoning": "say \"hi\" {", "confidence": 1}"#;
        assert_eq!(extract_json(text).unwrap()["confidence"], 1);
    }

    #[test]
    fn test_no_json_falls_back() {
        let first = parse_round_result("I think the code is in main.go", 1);
        assert_eq!(first.confidence, 90);
        assert!(first.tool_calls.is_empty());
        assert!(!first.structured);
        assert_eq!(first.reasoning, "I think the code is in main.go");

        let later = parse_round_result("not json {", 3);
        assert_eq!(later.confidence, 95);
        assert_eq!(later.round, 3);
    }

    #[test]
    fn test_parse_full_round() {
        let text = r#"```json
{
  "confidence": 60,
  "complexity": 45,
  "reasoning": "need to find the entry point",
  "tool_calls": [
    {"name": "search", "arg": "main"},
    {"tool": "list", "parameters": {"path": "cmd"}},
    42
  ]
}
```"#;
        let result = parse_round_result(text, 1);
        assert!(result.structured);
        assert_eq!(result.confidence, 60);
        assert_eq!(result.complexity, Some(45));
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].normalize().argument, "main");
        assert_eq!(result.tool_calls[1].normalize().argument, "cmd");
        assert!(result.keep_files.is_none());
    }

    #[test]
    fn test_confidence_clamped_and_coerced() {
        assert_eq!(parse_round_result(r#"{"confidence": 140}"#, 2).confidence, 100);
        assert_eq!(parse_round_result(r#"{"confidence": -5}"#, 2).confidence, 0);
        assert_eq!(parse_round_result(r#"{"confidence": "85%"}"#, 2).confidence, 85);
        // Missing confidence takes the round default
        assert_eq!(parse_round_result(r#"{"reasoning": "x"}"#, 2).confidence, 95);
    }

    #[test]
    fn test_keep_files_aliases() {
        let result = parse_round_result(r#"{"confidence": 97, "keep": ["main.go", ""]}"#, 2);
        assert_eq!(result.keep_files, Some(vec!["main.go".to_string()]));
    }

    #[test]
    fn test_file_selection() {
        assert_eq!(
            parse_file_selection(r#"{"files": ["a.go", "b.go"]}"#),
            Some(vec!["a.go".to_string(), "b.go".to_string()])
        );
        assert_eq!(
            parse_file_selection("```\n[\"x.rs\"]\n```"),
            Some(vec!["x.rs".to_string()])
        );
        assert_eq!(parse_file_selection(r#"["y.rs"]"#), Some(vec!["y.rs".to_string()]));
        assert_eq!(parse_file_selection("no idea"), None);
        assert_eq!(parse_file_selection(r#"{"files": []}"#), Some(vec![]));
    }
}
