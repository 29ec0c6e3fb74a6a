//! Advisory type hints for extracted values
//!
//! Nothing here rewrites or rejects a value. A value that does not look like
//! its declared type only earns a warning next to it in the response.

use crate::catalog::{FieldSpec, FieldType};
use chrono::NaiveDate;

/// Formats tried when a date field has no format hint, or the hint fails
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%m/%d/%y",
    "%Y%m%d",
];

const BOOLEAN_WORDS: &[&str] = &["included", "excluded", "yes", "no", "true", "false"];

/// Warning for a value that fits none of the field's declared types.
#[must_use]
pub fn check_value(field: &FieldSpec, value: &str) -> Option<String> {
    let value = value.trim();
    if field.types.iter().any(|t| fits(*t, field, value)) {
        return None;
    }

    let expected = match (field.primary_type(), &field.format) {
        (FieldType::Date, Some(format)) => format!("a date in format {format}"),
        (FieldType::Boolean, Some(format)) => format!("one of {format}"),
        _ if field.types.len() > 1 => format!("a {} value", field.declared_type),
        (t, _) => format!("a {} value", t.as_str().to_lowercase()),
    };
    Some(format!("Value '{value}' does not look like {expected}"))
}

fn fits(field_type: FieldType, field: &FieldSpec, value: &str) -> bool {
    match field_type {
        FieldType::String => true,
        FieldType::Date => parse_date_strict(field.format.as_deref(), value).is_some(),
        FieldType::Boolean => is_boolean(field.format.as_deref(), value),
        FieldType::Currency => parse_currency(value).is_some_and(|v| v >= 0.0),
        FieldType::Percentage => {
            parse_percentage(value).is_some_and(|v| (0.0..=100.0).contains(&v))
        }
    }
}

/// Convert a hint such as `MM/DD/YYYY` into a chrono format string.
#[must_use]
pub fn chrono_format(hint: &str) -> String {
    hint.replace("YYYY", "%Y")
        .replace("YY", "%y")
        .replace("MM", "%m")
        .replace("DD", "%d")
}

// With a hint only the hinted format counts
fn parse_date_strict(hint: Option<&str>, value: &str) -> Option<NaiveDate> {
    match hint {
        Some(hint) => NaiveDate::parse_from_str(value, &chrono_format(hint)).ok(),
        None => parse_date_lenient(value),
    }
}

fn parse_date_lenient(value: &str) -> Option<NaiveDate> {
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Parse a date value using the field's hint first, then common formats.
#[must_use]
pub fn parse_date(field: &FieldSpec, value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    field
        .format
        .as_deref()
        .and_then(|hint| NaiveDate::parse_from_str(value, &chrono_format(hint)).ok())
        .or_else(|| parse_date_lenient(value))
}

/// Parse `$1,234.56` style amounts.
#[must_use]
pub fn parse_currency(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse `12.5%` style values.
#[must_use]
pub fn parse_percentage(value: &str) -> Option<f64> {
    let cleaned = value.trim().trim_end_matches('%').trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn is_boolean(hint: Option<&str>, value: &str) -> bool {
    let lower = value.to_lowercase();
    BOOLEAN_WORDS.contains(&lower.as_str())
        || hint.is_some_and(|h| h.split('/').any(|opt| opt.trim().eq_ignore_ascii_case(value)))
}

const DATE_FORMAT_WARNING: &str =
    "Could not validate date relationship due to invalid date format";

/// Warning when an `*_effective_date` is not before its `*_expiration_date`,
/// or when both are present but one does not parse as a date.
///
/// `lookup` returns the extracted text for a field name.
pub fn date_order_warnings<'v, F>(fields: &[FieldSpec], lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<&'v str>,
{
    let mut warnings = Vec::new();
    for effective in fields {
        let Some(prefix) = effective.name.strip_suffix("_effective_date") else {
            continue;
        };
        let expiration_name = format!("{prefix}_expiration_date");
        let Some(expiration) = fields.iter().find(|f| f.name == expiration_name) else {
            continue;
        };

        let (Some(start), Some(end)) = (lookup(&effective.name), lookup(&expiration.name)) else {
            continue;
        };
        match (parse_date(effective, start), parse_date(expiration, end)) {
            (Some(start), Some(end)) if start >= end => warnings.push(format!(
                "{} should be before {}",
                humanize(&effective.name),
                humanize(&expiration.name)
            )),
            (Some(_), Some(_)) => {}
            _ => {
                if !warnings.iter().any(|w| w == DATE_FORMAT_WARNING) {
                    warnings.push(DATE_FORMAT_WARNING.to_string());
                }
            }
        }
    }
    warnings
}

fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}
