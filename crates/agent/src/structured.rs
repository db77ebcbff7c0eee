//! Structured responses: `<response>{json}</response>` inside free text
//!
//! The caller's type is turned into a JSON Schema, embedded in the prompt
//! so the agent can check itself, and enforced after the fact: extract the
//! delimited block, parse it, validate it, then deserialize.

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AgentError, ResponseFormatIssue};

pub const RESPONSE_START: &str = "<response>";
pub const RESPONSE_END: &str = "</response>";

/// Number of schema violations listed in a mismatch error
const MAX_REPORTED_VIOLATIONS: usize = 5;

static RESPONSE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<response>\s*(.*?)\s*</response>").expect("response block regex is valid")
});

/// JSON Schema for `T`
pub fn schema_for<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// Append the structured-answer instruction and the schema to `prompt`
pub fn structured_prompt(prompt: &str, schema: &Value) -> String {
    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{prompt}\n\n\
         When you are done, end your answer with a single JSON document wrapped \
         in {RESPONSE_START} and {RESPONSE_END} tags. The JSON must conform to this \
         JSON Schema:\n\n{schema_text}\n\n\
         Example of the required format:\n{RESPONSE_START}{{ ... }}{RESPONSE_END}"
    )
}

/// Extract the delimited block from `text`
pub fn extract_response_block(text: &str) -> Option<&str> {
    RESPONSE_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extract, parse and validate a structured response against `schema`,
/// then deserialize it into `T`. Nothing partial or coerced is returned.
pub fn parse_structured_response<T: DeserializeOwned>(
    text: &str,
    schema: &Value,
    session_id: Option<&str>,
) -> Result<T, AgentError> {
    let fail = |issue| AgentError::response_format(session_id, issue);

    let block = extract_response_block(text).ok_or_else(|| fail(ResponseFormatIssue::MissingDelimiters))?;

    let value: Value = serde_json::from_str(block)
        .map_err(|e| fail(ResponseFormatIssue::InvalidJson(e.to_string())))?;

    let validator = jsonschema::validator_for(schema)
        .map_err(|e| fail(ResponseFormatIssue::SchemaMismatch(format!("unusable schema: {}", e))))?;
    let violations: Vec<String> = validator
        .iter_errors(&value)
        .take(MAX_REPORTED_VIOLATIONS)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{} at {}", e, path)
            }
        })
        .collect();
    if !violations.is_empty() {
        return Err(fail(ResponseFormatIssue::SchemaMismatch(violations.join("; "))));
    }

    serde_json::from_value(value).map_err(|e| fail(ResponseFormatIssue::SchemaMismatch(e.to_string())))
}
