//! ISO-week date math.
//!
//! Three pure helpers shared by the aggregation pipeline: the Monday-to-Sunday
//! bounds of a week, ISO-8601 week numbering (the Thursday of a week decides
//! which year owns it), and the inverse mapping from (week, year) back to the
//! Monday that starts it.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// Start and end of the week containing `date`: Monday 00:00:00.000 through
/// Sunday 23:59:59.999. Weeks start on Monday, so a Sunday rolls back to the
/// previous Monday rather than forward.
pub fn week_range(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    let sunday = monday + Duration::days(6);
    let start = monday.and_hms_opt(0, 0, 0).unwrap();
    let end = sunday.and_hms_milli_opt(23, 59, 59, 999).unwrap();
    (start, end)
}

/// ISO-8601 week number of `date` (1..=53).
///
/// Shift to the Thursday of the same week, then count whole weeks since the
/// 1st of January of the Thursday's year.
pub fn iso_week_number(date: NaiveDate) -> u32 {
    let day_num = date.weekday().number_from_monday() as i64; // 1 = Monday
    let thursday = date + Duration::days(4 - day_num);
    let year_start = NaiveDate::from_ymd_opt(thursday.year(), 1, 1).unwrap();
    let days_since_start = (thursday - year_start).num_days();
    // ceil((days + 1) / 7)
    ((days_since_start + 7) / 7) as u32
}

/// The Monday starting ISO week `week` of `year`.
///
/// Consistent with [`iso_week_number`]: for every valid week of a year,
/// `iso_week_number(iso_week_start_date(w, y)) == w`.
pub fn iso_week_start_date(week: u32, year: i32) -> NaiveDate {
    let simple =
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap() + Duration::days(((week - 1) * 7) as i64);
    let dow = simple.weekday().num_days_from_sunday() as i64; // 0 = Sunday
    if dow <= 4 {
        simple - Duration::days(dow - 1)
    } else {
        simple + Duration::days(8 - dow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_week_range_spans_exactly_one_week() {
        for offset in 0..14 {
            let date = d(2024, 3, 4) + Duration::days(offset);
            let (start, end) = week_range(date);
            assert_eq!(start.weekday(), Weekday::Mon);
            assert_eq!(start.time(), chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
            let span = end - start;
            assert_eq!(span, Duration::days(6) + Duration::hours(23) + Duration::minutes(59) + Duration::seconds(59) + Duration::milliseconds(999));
        }
    }

    #[test]
    fn test_week_range_sunday_rolls_back() {
        // Sunday 2024-03-10 belongs to the week starting Monday 2024-03-04.
        let (start, end) = week_range(d(2024, 3, 10));
        assert_eq!(start.date(), d(2024, 3, 4));
        assert_eq!(end.date(), d(2024, 3, 10));
    }

    #[test]
    fn test_iso_week_number_reference_dates() {
        // Thursday decides the year.
        assert_eq!(iso_week_number(d(2026, 1, 1)), 1); // Thursday
        assert_eq!(iso_week_number(d(2025, 12, 29)), 1); // Monday of week 1, 2026
        assert_eq!(iso_week_number(d(2027, 1, 1)), 53); // Friday, still week 53 of 2026
        assert_eq!(iso_week_number(d(2023, 1, 1)), 52); // Sunday, week 52 of 2022
        assert_eq!(iso_week_number(d(2024, 6, 12)), 24);
    }

    #[test]
    fn test_iso_week_number_matches_chrono() {
        let mut date = d(2022, 1, 1);
        while date < d(2028, 1, 1) {
            assert_eq!(iso_week_number(date), date.iso_week().week(), "at {date}");
            date += Duration::days(1);
        }
    }

    #[test]
    fn test_iso_week_start_date_is_monday() {
        for year in [2023, 2024, 2025, 2026] {
            for week in [1, 2, 26, 52] {
                let start = iso_week_start_date(week, year);
                assert_eq!(start.weekday(), Weekday::Mon, "week {week} of {year}");
            }
        }
    }

    #[test]
    fn test_week_number_round_trip() {
        for year in [2023, 2024, 2025, 2026, 2027] {
            for week in 1..=52 {
                let start = iso_week_start_date(week, year);
                assert_eq!(iso_week_number(start), week, "week {week} of {year}");
            }
        }
    }

    #[test]
    fn test_week_one_boundary() {
        // 2023 starts on a Sunday: week 1 begins Monday 2023-01-02.
        assert_eq!(iso_week_start_date(1, 2023), d(2023, 1, 2));
        // 2024 starts on a Monday: week 1 begins on the 1st itself.
        assert_eq!(iso_week_start_date(1, 2024), d(2024, 1, 1));
        // 2027 starts on a Friday: week 1 begins Monday 2027-01-04.
        assert_eq!(iso_week_start_date(1, 2027), d(2027, 1, 4));
    }
}
