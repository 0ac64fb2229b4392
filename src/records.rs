//! Helpers for reading untyped document-store records.
//!
//! Source records accumulate renamed and duplicated fields as the schema
//! drifts (`totalBilled`, `billTotal`, `subtotal` may all exist with only one
//! populated), so every numeric read goes through an ordered candidate list:
//! the first field that coerces to a finite number wins, and everything else
//! falls back to zero. Nothing in this module can fail or panic.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Field names that may carry a record's creation date, most recent schema
/// first.
pub const CREATED_AT_FIELDS: &[&str] = &["createdAt", "created_at", "date"];

const ID_FIELDS: &[&str] = &["id", "_id"];

/// Coerce a single value to a finite number.
///
/// Strings are cleaned by dropping every character that is not a digit, `.`
/// or `-` before parsing, so `"1,200.50 BDT"` resolves to `1200.50`. Anything
/// that does not parse to a finite number is `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|parsed| parsed.is_finite()),
        Value::String(text) => {
            let cleaned: String = text
                .chars()
                .filter(|character| {
                    character.is_ascii_digit() || *character == '.' || *character == '-'
                })
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
        }
        _ => None,
    }
}

/// Resolve the first usable number from an ordered candidate list.
///
/// Callers must order candidates from most to least authoritative; the first
/// one that coerces wins. Returns `0.0` when none qualifies.
pub fn resolve(candidates: &[&Value]) -> f64 {
    candidates
        .iter()
        .find_map(|candidate| coerce_number(candidate))
        .unwrap_or(0.0)
}

/// Look up a (possibly nested) field by dot path, e.g. `packageInfo.packageId`.
pub fn value_at<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Resolve a numeric field from a record given an ordered list of dot paths.
pub fn resolve_path(record: &Value, paths: &[&str]) -> f64 {
    paths
        .iter()
        .filter_map(|path| value_at(record, path))
        .find_map(coerce_number)
        .unwrap_or(0.0)
}

/// Read a trimmed, non-empty string field; empty string when absent.
pub fn value_str(record: &Value, key: &str) -> String {
    value_at(record, key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

/// A record's identifier under either the current or the legacy key.
pub fn record_id(record: &Value) -> String {
    ID_FIELDS
        .iter()
        .map(|key| value_str(record, key))
        .find(|id| !id.is_empty())
        .unwrap_or_default()
}

/// The record's creation date, under any known field name, accepting both
/// `YYYY-MM-DD` and RFC 3339 timestamps.
pub fn parse_record_date(record: &Value) -> Option<NaiveDate> {
    CREATED_AT_FIELDS
        .iter()
        .map(|key| value_str(record, key))
        .filter(|text| !text.is_empty())
        .find_map(|text| {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d").ok().or_else(|| {
                DateTime::parse_from_rfc3339(&text)
                    .ok()
                    .map(|parsed| parsed.date_naive())
            })
        })
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
