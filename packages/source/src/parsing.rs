//! Shared parsing utilities for air-quality sources.
//!
//! Timestamp, number, and coordinate parsing used by the API clients and
//! the CSV importers.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parses a timestamp in any of the shapes providers emit: RFC 3339
/// (`2024-01-15T14:30:00+03:00`, `...Z`), naive ISO 8601 with optional
/// fractional seconds, or space-separated `YYYY-MM-DD HH:MM:SS`. Naive
/// timestamps are taken as UTC.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Parses an optional numeric cell. Blank cells and placeholders such as
/// `-`, `NaN`, or `N/A` yield `None`.
#[must_use]
pub fn parse_optional_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s.eq_ignore_ascii_case("n/a") {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Validates a lat/lng pair. Returns `None` if either is missing, zero, or
/// outside the WGS84 range.
#[must_use]
pub fn parse_lat_lng_f64(lat: Option<f64>, lng: Option<f64>) -> Option<(f64, f64)> {
    let latitude = lat?;
    let longitude = lng?;
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some((latitude, longitude))
}

/// Rounds to `decimals` decimal places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_timestamp("2024-01-15T17:30:00+03:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn parses_zulu_timestamp() {
        let dt = parse_timestamp("2024-01-15T14:30:00Z").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn parses_naive_with_fractional() {
        let dt = parse_timestamp("2024-01-15T14:30:00.000").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn parses_space_separated() {
        let dt = parse_timestamp("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn rejects_invalid_timestamp() {
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn optional_f64_handles_placeholders() {
        assert_eq!(parse_optional_f64(" 45.2 "), Some(45.2));
        assert_eq!(parse_optional_f64(""), None);
        assert_eq!(parse_optional_f64("-"), None);
        assert_eq!(parse_optional_f64("NaN"), None);
        assert_eq!(parse_optional_f64("N/A"), None);
    }

    #[test]
    fn rejects_zero_or_out_of_range_coordinates() {
        assert!(parse_lat_lng_f64(Some(0.0), Some(36.8)).is_none());
        assert!(parse_lat_lng_f64(Some(-1.28), None).is_none());
        assert!(parse_lat_lng_f64(Some(95.0), Some(36.8)).is_none());
        let (lat, lng) = parse_lat_lng_f64(Some(-1.2864), Some(36.8172)).unwrap();
        assert!((lat - -1.2864).abs() < f64::EPSILON);
        assert!((lng - 36.8172).abs() < f64::EPSILON);
    }

    #[test]
    fn rounds_to_decimals() {
        assert!((round_to(0.666_66, 2) - 0.67).abs() < f64::EPSILON);
        assert!((round_to(40.23, 1) - 40.2).abs() < f64::EPSILON);
    }
}
