//! Mapping raw model output onto the field catalog
//!
//! Every catalog field ends up in exactly one place: `extracted_data` (a value
//! or the `EMPTY VALUE` sentinel) or `failed_fields` (required and not found).
//! Keys the model invents are dropped with a single warning.

use crate::catalog::{FieldCatalog, FieldSpec};
use crate::hints;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Marker for "looked and found nothing"
pub const EMPTY_VALUE: &str = "EMPTY VALUE";

/// Keys under which a model may report its own per-field confidence
const CONFIDENCE_KEYS: &[&str] = &["confidence_scores", "_confidence"];

/// Fields whose presence usually means the model found the right document
const KEY_FIELDS: &[&str] = &["quote_number", "named_insured_name"];

/// One extracted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    #[must_use]
    pub fn empty() -> Self {
        Self::Text(EMPTY_VALUE.to_string())
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::List(_) => None,
        }
    }

    #[must_use]
    pub fn is_empty_value(&self) -> bool {
        self.as_text() == Some(EMPTY_VALUE)
    }

    /// Text used for scoring: list items joined with `, `
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join(", "),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Result of normalizing one model reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOutput {
    /// Values in catalog order
    pub extracted_data: IndexMap<String, FieldValue>,

    /// 0.0-1.0 per extracted field; empty unless requested
    pub confidence_scores: IndexMap<String, f64>,

    /// Required fields the model did not find
    pub failed_fields: Vec<String>,

    pub warnings: Vec<String>,

    /// Advisory per-field notes, e.g. a date in an unexpected format
    pub field_warnings: IndexMap<String, Vec<String>>,
}

impl NormalizedOutput {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed_fields.is_empty()
    }
}

enum Converted {
    Missing,
    Found(FieldValue, Option<String>),
}

/// Applies the catalog to a parsed model reply
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    catalog: &'a FieldCatalog,
    include_confidence: bool,
}

impl<'a> Normalizer<'a> {
    #[must_use]
    pub fn new(catalog: &'a FieldCatalog) -> Self {
        Self {
            catalog,
            include_confidence: false,
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, include_confidence: bool) -> Self {
        self.include_confidence = include_confidence;
        self
    }

    /// Normalize a parsed reply. `reply_text` is the raw text the object was
    /// recovered from; the confidence heuristic looks values up in it.
    #[must_use]
    pub fn normalize(&self, raw: &Map<String, Value>, reply_text: &str) -> NormalizedOutput {
        let mut out = NormalizedOutput::default();
        let reported = self.reported_confidence(raw);

        for field in self.catalog.iter() {
            match raw.get(&field.name).map_or(Converted::Missing, convert) {
                Converted::Found(value, note) => {
                    if let Some(note) = note {
                        push_field_warning(&mut out, &field.name, note);
                    }
                    for hint in value_hints(field, &value) {
                        push_field_warning(&mut out, &field.name, hint);
                    }
                    if self.include_confidence {
                        let score = reported
                            .as_ref()
                            .and_then(|scores| scores.get(&field.name).copied())
                            .unwrap_or_else(|| {
                                heuristic_confidence(&field.name, &value, reply_text)
                            });
                        out.confidence_scores.insert(field.name.clone(), score);
                    }
                    out.extracted_data.insert(field.name.clone(), value);
                }
                Converted::Missing if field.required => {
                    out.failed_fields.push(field.name.clone());
                }
                Converted::Missing => {
                    if self.include_confidence {
                        out.confidence_scores.insert(field.name.clone(), 0.0);
                    }
                    out.extracted_data.insert(field.name.clone(), FieldValue::empty());
                }
            }
        }

        let unexpected: Vec<&str> = raw
            .keys()
            .map(String::as_str)
            .filter(|key| !CONFIDENCE_KEYS.contains(key) && !self.catalog.contains(key))
            .collect();
        if !unexpected.is_empty() {
            debug!("Model returned {} unexpected keys", unexpected.len());
            out.warnings.push(format!(
                "Ignored unexpected fields in model response: {}",
                unexpected.join(", ")
            ));
        }

        let extracted = &out.extracted_data;
        let order = hints::date_order_warnings(self.catalog.fields(), |name| {
            extracted
                .get(name)
                .filter(|v| !v.is_empty_value())
                .and_then(FieldValue::as_text)
        });
        out.warnings.extend(order);

        if !out.failed_fields.is_empty() {
            out.warnings.push(format!(
                "Required fields not found: {}",
                out.failed_fields.join(", ")
            ));
        }

        out
    }

    fn reported_confidence(&self, raw: &Map<String, Value>) -> Option<IndexMap<String, f64>> {
        let scores = CONFIDENCE_KEYS
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_object))?;

        let parsed: IndexMap<String, f64> = scores
            .iter()
            .filter(|(name, _)| self.catalog.contains(name))
            .filter_map(|(name, value)| Some((name.clone(), parse_reported_score(value)?)))
            .collect();

        (!parsed.is_empty()).then_some(parsed)
    }
}

// Scores may arrive as 0-1 fractions, "85%" strings or bare 0-100 numbers
fn parse_reported_score(value: &Value) -> Option<f64> {
    let (score, percent) = match value {
        Value::Number(n) => (n.as_f64()?, false),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(number) => (number.trim().parse::<f64>().ok()?, true),
                None => (s.parse::<f64>().ok()?, false),
            }
        }
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }
    let score = if percent || (score > 1.0 && score <= 100.0) {
        score / 100.0
    } else {
        score
    };
    Some(score.clamp(0.0, 1.0))
}

fn push_field_warning(out: &mut NormalizedOutput, name: &str, warning: String) {
    out.field_warnings
        .entry(name.to_string())
        .or_default()
        .push(warning);
}

fn value_hints(field: &FieldSpec, value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::Text(text) if text == EMPTY_VALUE => Vec::new(),
        FieldValue::Text(text) => hints::check_value(field, text).into_iter().collect(),
        FieldValue::List(items) => items
            .iter()
            .filter_map(|item| hints::check_value(field, item))
            .collect(),
    }
}

fn is_sentinel(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(EMPTY_VALUE)
}

fn convert(value: &Value) -> Converted {
    match value {
        Value::Null => Converted::Missing,
        Value::String(s) if s.trim().is_empty() || is_sentinel(s) => Converted::Missing,
        Value::String(s) => Converted::Found(FieldValue::Text(s.trim().to_string()), None),
        Value::Number(n) => Converted::Found(FieldValue::Text(n.to_string()), None),
        Value::Bool(b) => Converted::Found(FieldValue::Text(b.to_string()), None),
        Value::Array(items) => {
            let list: Vec<String> = items.iter().filter_map(list_item).collect();
            if list.is_empty() {
                Converted::Missing
            } else {
                Converted::Found(FieldValue::List(list), None)
            }
        }
        Value::Object(map) if map.is_empty() => Converted::Missing,
        Value::Object(_) => Converted::Found(
            FieldValue::Text(value.to_string()),
            Some("Structured value returned, serialized as JSON".to_string()),
        ),
    }
}

fn list_item(item: &Value) -> Option<String> {
    match item {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() || is_sentinel(s) => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(_) | Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            Some(item.to_string())
        }
    }
}

/// Score a value when the model did not report one.
#[must_use]
pub fn heuristic_confidence(field_name: &str, value: &FieldValue, reply_text: &str) -> f64 {
    if value.is_empty_value() {
        return 0.0;
    }

    let text = value.joined();
    let len = text.chars().count();
    let mut score: f64 = 0.5;

    if len > 5 {
        score += 0.2;
    }
    if len < 3 {
        score -= 0.1;
    }
    if KEY_FIELDS.contains(&field_name) {
        score += 0.1;
    }
    if field_name.ends_with("_date") && (text.contains('/') || text.contains('-')) {
        score += 0.1;
    }
    if !text.is_empty() && reply_text.contains(&text) {
        score += 0.2;
    }

    (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
