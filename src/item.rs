//! Per-item field extraction and sanitizing.
//!
//! Normalization is total: every [`RawFeedItem`] maps to a [`NormalizedItem`]
//! whose fields are all plain strings, empty when the feed did not provide
//! (or provided an unusable) value.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use thiserror::Error;

use crate::feed::RawFeedItem;

/// Output format used when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A `date_format` string that chrono rejected.
#[derive(Debug, Error)]
#[error("invalid date format '{0}'")]
pub struct InvalidDateFormat(pub String);

/// A validated chrono strftime format applied to publish dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat(String);

impl DateFormat {
    /// Validates `format` up front so formatting can never fail mid-run.
    pub fn parse(format: &str) -> Result<Self, InvalidDateFormat> {
        if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
        {
            return Err(InvalidDateFormat(format.to_string()));
        }
        Ok(Self(format.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self(DEFAULT_DATE_FORMAT.to_string())
    }
}

/// A feed item with every field ready for substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedItem {
    /// Letters, digits, whitespace and hyphens only
    pub title: String,
    pub description: String,
    pub link: String,
    /// Formatted publish date, or empty when absent or unparsable
    pub publish_date: String,
    /// Enclosure / media thumbnail URL
    pub thumbnail: String,
}

/// Normalizes one raw item. Never fails.
pub fn normalize(raw: &RawFeedItem, date_format: &DateFormat) -> NormalizedItem {
    NormalizedItem {
        title: normalize_title(raw.title.as_deref().unwrap_or_default()),
        description: raw.description.clone().unwrap_or_default(),
        link: raw.link.clone().unwrap_or_default(),
        publish_date: raw
            .published
            .as_deref()
            .map(|d| normalize_date(d, date_format))
            .unwrap_or_default(),
        thumbnail: raw.enclosure.clone().unwrap_or_default(),
    }
}

/// Drops every character that is not a letter, digit, whitespace or `-`.
///
/// Idempotent: a normalized title normalizes to itself.
///
/// ```
/// use feed2md::item::normalize_title;
///
/// assert_eq!(normalize_title("Hello, World!"), "Hello World");
/// assert_eq!(normalize_title("Rust 1.75 — async/await"), "Rust 175  asyncawait");
/// ```
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect()
}

/// Parses a feed date and renders it with `format`, or returns an empty
/// string when the value is not a recognizable date.
///
/// Accepted inputs, tried in order: RFC 3339, RFC 2822, `YYYY-MM-DD`,
/// `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD HH:MM:SS`. Zoned timestamps are
/// converted to UTC first, so `2024-01-05T23:30:00-05:00` is `2024-01-06`.
pub fn normalize_date(raw: &str, format: &DateFormat) -> String {
    let Some(parsed) = parse_date(raw.trim()) else {
        tracing::debug!(date = %raw, "Unparsable publish date, leaving empty");
        return String::new();
    };

    let mut out = String::new();
    if write!(out, "{}", parsed.format(format.as_str())).is_err() {
        return String::new();
    }
    out
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc())
}
