use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::models::Timestamped;

/// Calendar granularity a timestamp is grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Week, Granularity::Month];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Granularity::Day => "By day",
            Granularity::Week => "By week",
            Granularity::Month => "By month",
        }
    }

    /// Key of the bucket following `key`. `key` must already be a bucket key
    /// of this granularity.
    pub fn next(self, key: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => key.checked_add_signed(Duration::days(1)),
            Granularity::Week => key.checked_add_signed(Duration::days(7)),
            Granularity::Month => key.checked_add_months(Months::new(1)),
        }
    }
}

/// Calendar date of `ts`.
pub fn day(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Monday of the ISO week containing `ts`.
pub fn week(ts: DateTime<Utc>) -> NaiveDate {
    let date = ts.date_naive();
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// First day of the calendar month containing `ts`.
pub fn month(ts: DateTime<Utc>) -> NaiveDate {
    let date = ts.date_naive();
    date - Duration::days(i64::from(date.day0()))
}

pub fn bucket_key(ts: DateTime<Utc>, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => day(ts),
        Granularity::Week => week(ts),
        Granularity::Month => month(ts),
    }
}

pub fn bucket_records<T: Timestamped>(
    records: &[T],
    granularity: Granularity,
) -> impl Iterator<Item = (NaiveDate, &T)> {
    records
        .iter()
        .map(move |record| (bucket_key(record.created_at(), granularity), record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn same_calendar_day_shares_day_key() {
        assert_eq!(day(at(2024, 3, 5, 0, 0)), day(at(2024, 3, 5, 23, 59)));
        assert_eq!(day(at(2024, 3, 5, 23, 59)), date(2024, 3, 5));
        assert_ne!(day(at(2024, 3, 5, 23, 59)), day(at(2024, 3, 6, 0, 0)));
    }

    #[test]
    fn week_key_is_monday_of_iso_week() {
        // 2024-01-01 is a Monday, 2024-01-07 the Sunday closing that week.
        assert_eq!(week(at(2024, 1, 1, 0, 0)), date(2024, 1, 1));
        assert_eq!(week(at(2024, 1, 7, 23, 59)), date(2024, 1, 1));
        assert_eq!(week(at(2024, 1, 8, 0, 0)), date(2024, 1, 8));
        // Week spanning a year boundary.
        assert_eq!(week(at(2025, 1, 1, 12, 0)), date(2024, 12, 30));

        for offset in 0..60 {
            let ts = at(2024, 2, 1, 10, 0) + Duration::days(offset);
            assert_eq!(week(ts).weekday(), Weekday::Mon);
        }
    }

    #[test]
    fn month_key_is_first_of_month() {
        assert_eq!(month(at(2024, 2, 29, 18, 0)), date(2024, 2, 1));
        assert_eq!(month(at(2024, 12, 31, 23, 59)), date(2024, 12, 1));
        for offset in 0..400 {
            let ts = at(2023, 11, 15, 10, 0) + Duration::days(offset);
            assert_eq!(month(ts).day(), 1);
        }
    }

    #[test]
    fn bucket_keys_are_monotonic() {
        let mut previous = at(2023, 12, 25, 3, 0);
        for step in 1..500 {
            let current = previous + Duration::hours(7 * step % 50 + 1);
            for granularity in Granularity::ALL {
                assert!(bucket_key(previous, granularity) <= bucket_key(current, granularity));
            }
            previous = current;
        }
    }

    #[test]
    fn next_steps_one_bucket() {
        assert_eq!(Granularity::Day.next(date(2024, 2, 28)), Some(date(2024, 2, 29)));
        assert_eq!(Granularity::Week.next(date(2024, 12, 30)), Some(date(2025, 1, 6)));
        assert_eq!(Granularity::Month.next(date(2024, 12, 1)), Some(date(2025, 1, 1)));
    }
}
