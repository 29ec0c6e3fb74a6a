//! Recovering a JSON object from raw model text
//!
//! Models asked for JSON still wrap it in code fences, prefix it with prose
//! or occasionally emit something that is only JSON-ish. Strategies are tried
//! from strictest to loosest:
//!
//! 1. the whole reply
//! 2. a ```` ```json ```` fenced block, then any fenced block
//! 3. the span from the first `{` to the last `}`
//! 4. a line-oriented `"key": "value"` scan

use crate::error::ExtractError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Characters of the reply kept in error messages
pub const PREVIEW_CHARS: usize = 500;

static RE_JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid json fence regex")
});
static RE_ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)\s*```").expect("valid fence regex")
});
static RE_KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""?([A-Za-z_][A-Za-z0-9_]*)"?\s*:\s*"([^"]*)""#).expect("valid key value regex")
});

/// Parse the model reply into a JSON object.
///
/// # Errors
/// Returns `MalformedResponse` when no strategy yields an object.
pub fn parse_model_json(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(malformed("Model returned an empty response", text));
    }

    if let Some(object) = parse_object(trimmed) {
        return Ok(object);
    }

    for fence in [&*RE_JSON_FENCE, &*RE_ANY_FENCE] {
        if let Some(object) = fence
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_object(m.as_str()))
        {
            debug!("Recovered JSON from fenced block");
            return Ok(object);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(object) = parse_object(&trimmed[start..=end]) {
                debug!("Recovered JSON from brace span");
                return Ok(object);
            }
        }
    }

    let scanned = scan_key_values(trimmed);
    if !scanned.is_empty() {
        warn!(
            "Model reply was not valid JSON, recovered {} fields by line scan",
            scanned.len()
        );
        return Ok(scanned);
    }

    Err(malformed("Could not parse JSON from model response", text))
}

// Objects pass through; an array is accepted when its first element is one
fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) => Some(map),
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

fn scan_key_values(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for line in text.lines() {
        if let Some(caps) = RE_KEY_VALUE.captures(line) {
            map.insert(caps[1].to_string(), Value::String(caps[2].trim().to_string()));
        }
    }
    map
}

fn malformed(message: &str, text: &str) -> ExtractError {
    ExtractError::MalformedResponse {
        message: message.to_string(),
        preview: text.chars().take(PREVIEW_CHARS).collect(),
    }
}
