//! Timestamp coercion
//!
//! Cells are parsed into offset-aware date-times. Offsets present in the source
//! are preserved; naive values are taken as UTC.

use crate::types::Value;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Offset-aware formats tried after RFC 3339
const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Naive formats, interpreted as UTC
const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Coerce a cell into a timestamp
///
/// Text is parsed as RFC 3339 or one of the common log formats, numbers are Unix
/// epoch seconds, timestamps pass through. The error is a human-readable reason.
pub fn coerce_timestamp(value: &Value) -> Result<DateTime<FixedOffset>, String> {
    match value {
        Value::Timestamp(ts) => Ok(*ts),
        Value::Text(s) => parse_timestamp_str(s),
        Value::Int(secs) => from_epoch(*secs, 0),
        Value::Float(secs) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            from_epoch(whole as i64, nanos.min(999_999_999))
        }
        Value::Float(_) => Err("non-finite epoch value".to_string()),
        Value::Null => Err("missing timestamp".to_string()),
        Value::Bool(_) => Err("boolean is not a timestamp".to_string()),
    }
}

/// Parse a textual timestamp
pub fn parse_timestamp_str(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty timestamp".to_string());
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().with_timezone(&Utc.fix()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc().with_timezone(&Utc.fix()));
        }
    }

    Err("unrecognized timestamp format".to_string())
}

fn from_epoch(secs: i64, nanos: u32) -> Result<DateTime<FixedOffset>, String> {
    DateTime::from_timestamp(secs, nanos)
        .map(|ts| ts.with_timezone(&Utc.fix()))
        .ok_or_else(|| format!("epoch value {secs} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_rfc3339_preserves_offset() {
        let ts = parse_timestamp_str("2016-01-01T09:51:15.304+01:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 3600);
        assert_eq!(ts.hour(), 9);
    }

    #[test]
    fn test_space_separated_with_offset() {
        let ts = parse_timestamp_str("2016-01-02 10:00:00+00:00").unwrap();
        assert_eq!(ts.day(), 2);
        assert_eq!(ts.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_naive_is_utc() {
        let ts = parse_timestamp_str("2016-01-02 10:00:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(ts.hour(), 10);

        let date_only = parse_timestamp_str("2016-03-04").unwrap();
        assert_eq!(date_only.month(), 3);
        assert_eq!(date_only.hour(), 0);
    }

    #[test]
    fn test_epoch_seconds() {
        let ts = coerce_timestamp(&Value::Int(86_400)).unwrap();
        assert_eq!(ts.to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_passthrough() {
        let ts = parse_timestamp_str("2016-01-01T00:00:00Z").unwrap();
        assert_eq!(coerce_timestamp(&Value::Timestamp(ts)).unwrap(), ts);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timestamp_str("not a date").is_err());
        assert!(coerce_timestamp(&Value::Null).is_err());
        assert!(coerce_timestamp(&Value::Bool(true)).is_err());
    }
}
