use crate::error::{MeterDeltaError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Last calendar day of the month before `date`'s month.
pub fn prev_month_end(date: NaiveDate) -> Option<NaiveDate> {
    let year = if date.month() == 1 {
        date.year() - 1
    } else {
        date.year()
    };

    let month = if date.month() == 1 {
        12
    } else {
        date.month() - 1
    };

    last_day_of_month(year, month)
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    last_day_of_month(year, month).map(|d| d.day())
}

/// Every calendar day in `[start, end]`, ascending. Empty when `end < start`.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

pub fn validate_month(month: u32) -> bool {
    (1..=12).contains(&month)
}

/// Parses a period string in the format "YYYY-MM" into `(year, month)`.
pub fn parse_period_string(period: &str) -> Result<(i32, u32)> {
    let start_str = format!("{}-01", period.trim());
    let start_date = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d")
        .map_err(|_| MeterDeltaError::InvalidPeriodString(period.to_string()))?;

    Ok((start_date.year(), start_date.month()))
}
