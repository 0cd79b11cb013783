//! Wall-clock timestamp helpers.
//!
//! Timestamps travel as ISO-8601 local strings without an offset; the zone is
//! carried separately as a name. Offsets sent by the oracle are dropped and the
//! wall-clock part kept as written.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const ACCEPTED_DATE_TIME_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.naive_local());
    }

    let without_fraction = trimmed.split('.').next().unwrap_or(trimmed);
    let without_zulu = without_fraction.trim_end_matches('Z');
    ACCEPTED_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(without_zulu, format).ok())
}

pub fn normalize_date_time(raw: &str) -> Option<String> {
    parse_date_time(raw).map(|value| value.format(DATE_TIME_FORMAT).to_string())
}

pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Some(date.format(DATE_FORMAT).to_string());
    }
    parse_date_time(trimmed).map(|value| value.date().format(DATE_FORMAT).to_string())
}

pub fn add_minutes(start: &str, minutes: i64) -> Option<String> {
    let start = parse_date_time(start)?;
    let end = start.checked_add_signed(Duration::minutes(minutes))?;
    Some(end.format(DATE_TIME_FORMAT).to_string())
}
