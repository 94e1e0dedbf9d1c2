//! Lenient date parsing for document dates.
//!
//! `uploadDate` and `expiryDate` arrive as free-form strings. Values that cannot be parsed
//! become `None`; they never fail the surrounding operation.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a date string, returning `None` for empty or unparseable input.
pub fn parse_lenient_date(raw: Option<&str>) -> Option<NaiveDate> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    tracing::debug!(value = %value, "Discarding unparseable document date");
    None
}
