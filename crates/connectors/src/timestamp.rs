use crate::error::FileError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt::Write;

/// Rendering used when a column has no `format`.
pub const DEFAULT_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f %z";

const FALLBACK_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d"];

/// Parses `value` with a strftime `format`. Without a format, RFC 3339 and a
/// few common layouts are tried. Values without an offset are read as UTC.
pub fn parse(value: &str, format: Option<&str>) -> Result<DateTime<Utc>, FileError> {
    if let Some(format) = format {
        return parse_with(value, format).ok_or_else(|| FileError::Timestamp {
            value: value.to_string(),
            reason: format!("does not match '{format}'"),
        });
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|format| parse_with(value, format))
        .ok_or_else(|| FileError::Timestamp {
            value: value.to_string(),
            reason: "unrecognized layout".to_string(),
        })
}

fn parse_with(value: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_str(value, format) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(value, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

pub fn format(value: &DateTime<Utc>, format: Option<&str>) -> Result<String, FileError> {
    let format = format.unwrap_or(DEFAULT_OUTPUT_FORMAT);
    let mut out = String::new();
    write!(out, "{}", value.format(format)).map_err(|_| FileError::Timestamp {
        value: value.to_rfc3339(),
        reason: format!("invalid format '{format}'"),
    })?;
    Ok(out)
}
