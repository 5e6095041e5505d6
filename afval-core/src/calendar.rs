//! Date strings and month-rollover checks.

use chrono::{Datelike, Days, NaiveDate};

/// Format a date as `YYYY-MM-DD`, padding month and day below ten with a `0`.
#[must_use]
pub fn format_date(year: i32, month: u32, day: u32) -> String {
    format!("{year}-{}-{}", pad(month), pad(day))
}

fn pad(value: u32) -> String {
    if value < 10 {
        format!("0{value}")
    } else {
        value.to_string()
    }
}

/// Whether `day` closes `month`.
///
/// February counts both the 28th and the 29th as its last day, leap year or not.
#[must_use]
pub fn is_last_day_of_month(month: u32, day: u32) -> bool {
    match day {
        31 => matches!(month, 1 | 3 | 5 | 7 | 8 | 10 | 12),
        30 => matches!(month, 4 | 6 | 9 | 11),
        28 | 29 => month == 2,
        _ => false,
    }
}

/// The month after `month`, rolling the year over after December.
#[must_use]
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Everything a poll needs to know about the current day.
pub struct PollDates {
    /// Today as `YYYY-MM-DD`.
    pub today: String,
    /// Tomorrow as `YYYY-MM-DD`.
    pub tomorrow: String,
    /// Current year.
    pub year: i32,
    /// Current month, 1-based.
    pub month: u32,
    /// Current day of month.
    pub day: u32,
}

impl PollDates {
    /// Build the poll dates for the given local day.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
        Self {
            today: format_date(date.year(), date.month(), date.day()),
            tomorrow: format_date(next.year(), next.month(), next.day()),
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Whether today closes the current month.
    #[must_use]
    pub fn is_last_day_of_month(&self) -> bool {
        is_last_day_of_month(self.month, self.day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_single_digits() {
        assert_eq!(format_date(2025, 3, 7), "2025-03-07");
        assert_eq!(format_date(2025, 11, 30), "2025-11-30");
        assert_eq!(format_date(2025, 1, 10), "2025-01-10");
    }

    #[test]
    fn last_day_table() {
        assert!(is_last_day_of_month(2, 28));
        assert!(is_last_day_of_month(2, 29));
        assert!(is_last_day_of_month(4, 30));
        assert!(!is_last_day_of_month(4, 31));
        assert!(is_last_day_of_month(12, 31));
        assert!(is_last_day_of_month(8, 31));
        assert!(!is_last_day_of_month(7, 30));
        assert!(!is_last_day_of_month(2, 27));
        assert!(!is_last_day_of_month(3, 28));
    }

    #[test]
    fn rolls_year_after_december() {
        assert_eq!(next_month(2025, 12), (2026, 1));
        assert_eq!(next_month(2025, 4), (2025, 5));
    }

    #[test]
    fn poll_dates_cross_year() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).expect("valid date");
        let dates = PollDates::from_date(date);
        assert_eq!(dates.today, "2025-12-31");
        assert_eq!(dates.tomorrow, "2026-01-01");
        assert_eq!((dates.year, dates.month, dates.day), (2025, 12, 31));
        assert!(dates.is_last_day_of_month());
    }
}
