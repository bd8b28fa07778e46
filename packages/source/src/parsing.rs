//! Shared parsing utilities for delimited inputs.
//!
//! Header normalization plus the timestamp and coordinate parsers used by
//! the crime and auxiliary point loaders.

use chrono::NaiveDateTime;

/// Timestamp layout of the Chicago crime export (`01/15/2024 02:30:00 PM`).
pub const CHICAGO_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// ISO 8601 layouts tried when the configured format does not match.
const FALLBACK_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Normalizes a header cell: trimmed, lowercased, spaces replaced by `_`.
///
/// `"Primary Type "` becomes `"primary_type"`.
#[must_use]
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

/// Parses a timestamp with `format`, falling back to common ISO 8601
/// layouts. Returns `None` for blank or unparseable values.
#[must_use]
pub fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
        return Some(parsed);
    }

    FALLBACK_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fallback| NaiveDateTime::parse_from_str(value, fallback).ok())
}

/// Parses a projected coordinate. Returns `None` if blank, unparseable, or
/// not finite.
#[must_use]
pub fn parse_coordinate(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
