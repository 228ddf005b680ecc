//! Oracle response parsing.
//!
//! Oracle output is untrusted free text. [`parse_classification`] is total:
//! anything it cannot read becomes [`ClassificationResult::Unmatched`].

use serde_json::{Map, Value};
use tracing::debug;

use crate::pipeline::types::{ClassificationResult, MatchedTask, NOT_AVAILABLE, value_to_text};

/// Classify raw oracle output for a message whose body was `original_text`.
pub fn parse_classification(raw: &str, original_text: &str) -> ClassificationResult {
    let unmatched = || ClassificationResult::Unmatched {
        original_text: original_text.to_string(),
    };

    let candidate = extract_fenced_block(raw);
    let object: Map<String, Value> = match serde_json::from_str(candidate) {
        Ok(Value::Object(map)) => map,
        _ => {
            debug!(raw = %raw, "Oracle answer unreadable, treating as unmatched");
            return unmatched();
        }
    };

    if let Some(reason) = object.get("error") {
        return ClassificationResult::OracleFailure {
            reason: value_to_text(reason),
        };
    }

    if object.contains_key("Unmatched") {
        return unmatched();
    }

    ClassificationResult::Matched(MatchedTask {
        task: field(&object, "Task"),
        priority: field(&object, "Priority"),
        deadline: field(&object, "Deadline"),
        in_charge: field(&object, "In-Charge"),
    })
}

fn field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(value) => value_to_text(value),
    }
}

/// Return the body of the first code fence, preferring a ```` ```json ````
/// fence. Text without fences is returned trimmed.
fn extract_fenced_block(text: &str) -> &str {
    const JSON_FENCE: &str = "```json";
    const FENCE: &str = "```";

    let body = if let Some(start) = text.find(JSON_FENCE) {
        &text[start + JSON_FENCE.len()..]
    } else if let Some(start) = text.find(FENCE) {
        &text[start + FENCE.len()..]
    } else {
        return text.trim();
    };

    match body.find(FENCE) {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}
