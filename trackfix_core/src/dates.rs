use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::TrackfixError;

/// Formats `utc_date` into a string like "2024-09-01T05:10:44Z".
/// This is the format that GPX files contain. Sub-second precision is kept
/// when the source carried it, so a decode of the output reproduces the
/// parsed instant exactly.
pub fn format_utc_date(utc_date: &DateTime<Utc>) -> String {
    utc_date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses an ISO-8601 instant and normalizes it to UTC. Garmin devices
/// sometimes write timestamps without a timezone designator; those are taken
/// to be UTC already.
pub fn parse_utc_date(s: &str) -> Result<DateTime<Utc>, TrackfixError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.to_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    Err(TrackfixError::InvalidFormat(format!(
        "date could not be parsed: {s}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn parse_utc_date_accepts_z_suffix() {
        let dt = parse_utc_date("2024-02-02T10:10:54Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 2, 2, 10, 10, 54).unwrap());
    }

    #[test]
    fn parse_utc_date_normalizes_offsets() {
        let dt = parse_utc_date("2024-02-02T12:10:54+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 2, 2, 10, 10, 54).unwrap());
    }

    #[test]
    fn parse_utc_date_accepts_missing_timezone() {
        let dt = parse_utc_date("2024-02-02T10:10:54").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 2, 2, 10, 10, 54).unwrap());
    }

    #[test]
    fn parse_utc_date_rejects_garbage() {
        assert!(parse_utc_date("not a date").is_err());
    }

    #[test]
    fn format_utc_date_round_trips() {
        let dt = Utc.with_ymd_and_hms(2024, 9, 1, 5, 10, 44).unwrap();
        let s = format_utc_date(&dt);
        assert_eq!(s, "2024-09-01T05:10:44Z");
        assert_eq!(parse_utc_date(&s).unwrap(), dt);
    }

    #[test]
    fn format_utc_date_keeps_subsecond_precision() {
        let dt = Utc.with_ymd_and_hms(2024, 9, 1, 5, 10, 44).unwrap()
            + Duration::milliseconds(250);
        let s = format_utc_date(&dt);
        assert_eq!(s, "2024-09-01T05:10:44.250Z");
        assert_eq!(parse_utc_date(&s).unwrap(), dt);
    }
}
