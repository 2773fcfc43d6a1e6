//! Calendar-date handling shared by the CLI, view filters and reports.
//!
//! Records carry UTC instants; everything a dispatcher sees is a calendar
//! date or wall-clock time in the report time zone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// Accepted layouts for local date-times, most specific first.
const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Long date in the report style, e.g. "January 5th, 2024".
#[must_use]
pub fn long_date(date: NaiveDate) -> String {
    format!(
        "{} {}{}, {}",
        date.format("%B"),
        date.day(),
        ordinal_suffix(date.day()),
        date.year()
    )
}

/// English ordinal suffix for a day of the month.
#[must_use]
pub fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// 12-hour wall-clock time, e.g. "8:30 AM".
#[must_use]
pub fn clock_time(datetime: NaiveDateTime) -> String {
    datetime.format("%-I:%M %p").to_string()
}

/// The calendar date of an instant in the given time zone.
#[must_use]
pub fn calendar_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Today's date in the given time zone.
#[must_use]
pub fn today<Tz: TimeZone>(tz: &Tz) -> NaiveDate {
    calendar_date(Utc::now(), tz)
}

/// Parse a calendar date: `YYYY-MM-DD`, `today` or `yesterday`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the input is not a recognised date.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();
    match input.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| Error::invalid_input(format!("expected a date like 2024-01-05, got {input:?}")))
}

/// Parse a point in time: RFC 3339, or a local date-time in `tz`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the input cannot be parsed or names a
/// wall-clock time that does not exist in `tz`.
pub fn parse_datetime<Tz: TimeZone>(input: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "expected a time like 2024-01-05T08:30, got {input:?}"
            ))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::invalid_input(format!("{input} does not exist in the local time zone")))
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_long_date() {
        assert_eq!(long_date(date(2024, 1, 5)), "January 5th, 2024");
        assert_eq!(long_date(date(2024, 3, 1)), "March 1st, 2024");
        assert_eq!(long_date(date(2023, 12, 22)), "December 22nd, 2023");
        assert_eq!(long_date(date(2024, 8, 13)), "August 13th, 2024");
    }

    #[test]
    fn test_ordinal_suffix() {
        let expected = [
            (1, "st"),
            (2, "nd"),
            (3, "rd"),
            (4, "th"),
            (11, "th"),
            (12, "th"),
            (13, "th"),
            (21, "st"),
            (22, "nd"),
            (23, "rd"),
            (30, "th"),
            (31, "st"),
        ];
        for (day, suffix) in expected {
            assert_eq!(ordinal_suffix(day), suffix, "day {day}");
        }
    }

    #[test]
    fn test_clock_time() {
        let morning = date(2024, 1, 5).and_hms_opt(8, 5, 0).unwrap();
        let evening = date(2024, 1, 5).and_hms_opt(18, 30, 0).unwrap();
        let midnight = date(2024, 1, 5).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(clock_time(morning), "8:05 AM");
        assert_eq!(clock_time(evening), "6:30 PM");
        assert_eq!(clock_time(midnight), "12:00 AM");
    }

    #[test]
    fn test_calendar_date_uses_time_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 5, 23, 30, 0).unwrap();
        assert_eq!(calendar_date(instant, &Utc), date(2024, 1, 5));

        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(calendar_date(instant, &east), date(2024, 1, 6));
    }

    #[test]
    fn test_parse_date() {
        let today = date(2024, 1, 5);
        assert_eq!(parse_date("2024-02-29", today).unwrap(), date(2024, 2, 29));
        assert_eq!(parse_date("today", today).unwrap(), today);
        assert_eq!(parse_date("Yesterday", today).unwrap(), date(2024, 1, 4));
        assert!(parse_date("05/01/2024", today).is_err());
        assert!(parse_date("2023-02-29", today).is_err());
    }

    #[test]
    fn test_parse_datetime_rfc3339() {
        let parsed = parse_datetime("2024-01-05T08:30:00+02:00", &Utc).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 5, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_datetime_local_forms() {
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 5, 13, 30, 0).unwrap();
        assert_eq!(parse_datetime("2024-01-05T08:30", &west).unwrap(), expected);
        assert_eq!(parse_datetime("2024-01-05 08:30", &west).unwrap(), expected);
        assert_eq!(parse_datetime("2024-01-05 08:30:00", &west).unwrap(), expected);
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        let err = parse_datetime("half past eight", &Utc).unwrap_err();
        assert!(err.to_string().contains("half past eight"));
    }
}
