// src/utils/time.rs

//! Timestamp parsing for feed values.
//!
//! Feed dates come in several shapes: full RFC 3339 instants
//! (`2025-03-27T11:52:44.870+01:00`), naive date-times, bare dates
//! (`2025-03-27`) and dates carrying a zone suffix (`2025-03-27+02:00`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Parse a feed timestamp into a UTC instant.
///
/// Bare dates resolve to midnight UTC, zoned dates to midnight in their
/// zone. Returns `None` for anything else.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }

    // `2025-03-27+02:00` / `2025-03-27Z`: midnight in the given zone
    let (date, zone) = s.split_at_checked(10)?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    DateTime::parse_from_rfc3339(&format!("{}T00:00:00{zone}", date.format("%Y-%m-%d")))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop the sub-second part of an instant.
///
/// Feed pages format the same instant with differing fractional precision,
/// so cursor comparisons happen at whole seconds.
pub fn truncate_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.with_nanosecond(0).unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let parsed = parse_instant("2025-03-27T11:52:44.870+01:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-27T10:52:44.870+00:00");
    }

    #[test]
    fn test_parse_bare_and_zoned_dates() {
        let bare = parse_instant("2025-03-27").unwrap();
        assert_eq!(bare.to_rfc3339(), "2025-03-27T00:00:00+00:00");
        assert_eq!(parse_instant("2025-03-27Z"), Some(bare));

        let zoned = parse_instant("2025-03-27+02:00").unwrap();
        assert_eq!(zoned.to_rfc3339(), "2025-03-26T22:00:00+00:00");
        let west = parse_instant("2025-03-27-05:00").unwrap();
        assert_eq!(west.to_rfc3339(), "2025-03-27T05:00:00+00:00");
    }

    #[test]
    fn test_parse_rejects_trailing_text_after_date() {
        assert!(parse_instant("2025-03-27junk").is_none());
        assert!(parse_instant("2025-03-27+02:00 extra").is_none());
        assert!(parse_instant("2025-03-27 ").is_some());
    }

    #[test]
    fn test_parse_naive_datetime() {
        let parsed = parse_instant("2025-04-25T14:30:48").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-04-25T14:30:48+00:00");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_instant("").is_none());
        assert!(parse_instant("yesterday").is_none());
        assert!(parse_instant("2025").is_none());
    }

    #[test]
    fn test_truncate_to_second() {
        let a = parse_instant("2025-08-17T10:00:00.999Z").unwrap();
        let b = parse_instant("2025-08-17T10:00:00.001Z").unwrap();
        assert_ne!(a, b);
        assert_eq!(truncate_to_second(a), truncate_to_second(b));
    }
}
