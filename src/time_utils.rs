// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Calendar day of `at` as observed at `offset` from UTC.
pub fn calendar_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_utc_rfc3339() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_utc_rfc3339(at), "2026-01-02T03:04:05Z");
    }

    #[test]
    fn test_calendar_day_respects_offset() {
        // 20:00 UTC is already the next day at UTC+7
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 20, 0, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let wib = FixedOffset::east_opt(7 * 3600).unwrap();

        assert_eq!(calendar_day(at, utc), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(calendar_day(at, wib), NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }
}
