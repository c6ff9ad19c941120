//! Helpers for reading JSON out of LLM completions

use crate::error::{DocQueryError, Result};
use serde_json::{Map, Value};

/// Strip Markdown code-fence wrapping (```json ... ```) from a completion
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```JSON") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    inner.trim().trim_end_matches("```").trim()
}

/// Parse a completion into a JSON object, after fence stripping
pub fn parse_json_object(response: &str) -> Result<Map<String, Value>> {
    let cleaned = strip_code_fences(response);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DocQueryError::Llm(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => {
            tracing::debug!("Response was: {}", response);
            Err(DocQueryError::Llm(format!("response was not valid JSON: {}", e)))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
