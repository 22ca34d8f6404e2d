//! Lenient timestamp parsing for heterogeneous sensor exports.
//!
//! Month-first is assumed for ambiguous slash dates (`03/04/2020` is March 4th).
//! Stamps carrying an offset are converted to UTC; naive stamps are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Formats with an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%d-%b-%Y %H:%M:%S%.f",
    "%b %d %Y %H:%M:%S%.f",
    "%Y%m%dT%H%M%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%b-%Y"];

/// Parses a timestamp cell, returning `None` for empty or unrecognized text.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            let dt = date.and_time(NaiveTime::MIN);
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_iso_variants() {
        let expected = utc(2020, 3, 4, 12, 30, 15);
        assert_eq!(parse_timestamp("2020-03-04T12:30:15"), Some(expected));
        assert_eq!(parse_timestamp("2020-03-04 12:30:15"), Some(expected));
        assert_eq!(parse_timestamp("2020-03-04T12:30:15Z"), Some(expected));
        assert_eq!(parse_timestamp("  2020-03-04 12:30:15 "), Some(expected));
    }

    #[test]
    fn test_fractional_seconds_are_kept() {
        let parsed = parse_timestamp("2020-03-04 12:30:15.250").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_offsets_convert_to_utc() {
        assert_eq!(
            parse_timestamp("2020-03-04T14:30:15+02:00"),
            Some(utc(2020, 3, 4, 12, 30, 15))
        );
        assert_eq!(
            parse_timestamp("2020-03-04 14:30:15+0200"),
            Some(utc(2020, 3, 4, 12, 30, 15))
        );
    }

    #[test]
    fn test_slash_dates_are_month_first() {
        assert_eq!(
            parse_timestamp("03/04/2020 12:30"),
            Some(utc(2020, 3, 4, 12, 30, 0))
        );
        assert_eq!(
            parse_timestamp("03/04/2020 01:30:00 PM"),
            Some(utc(2020, 3, 4, 13, 30, 0))
        );
    }

    #[test]
    fn test_other_common_formats() {
        assert_eq!(
            parse_timestamp("04.03.2020 12:30:15"),
            Some(utc(2020, 3, 4, 12, 30, 15))
        );
        assert_eq!(
            parse_timestamp("2020/03/04 12:30:15"),
            Some(utc(2020, 3, 4, 12, 30, 15))
        );
        assert_eq!(
            parse_timestamp("04-Mar-2020 12:30:15"),
            Some(utc(2020, 3, 4, 12, 30, 15))
        );
    }

    #[test]
    fn test_date_only() {
        assert_eq!(parse_timestamp("2020-03-04"), Some(utc(2020, 3, 4, 0, 0, 0)));
    }

    #[test]
    fn test_unparsable() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("Mission day 12"), None);
    }
}
