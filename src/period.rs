//! Calendar window for one reporting month.
//!
//! A [`Period`] covers every calendar day of the target month plus a single
//! anchor day, the last day of the preceding month, whose reading seeds the
//! delta of the month's first day.

use crate::error::{MeterDeltaError, Result};
use crate::utils::{
    days_in_range, first_day_of_month, last_day_of_month, parse_period_string, prev_month_end,
    validate_month,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    month: u32,
    year: i32,
    first_day: NaiveDate,
    last_day: NaiveDate,
    anchor_day: NaiveDate,
}

impl Period {
    /// Resolves the window for `(month, year)`.
    ///
    /// Fails with [`MeterDeltaError::InvalidPeriod`] when the month is outside
    /// `1..=12` or the dates involved fall outside chrono's representable range.
    pub fn new(month: u32, year: i32) -> Result<Self> {
        let invalid = || MeterDeltaError::InvalidPeriod { month, year };

        if !validate_month(month) {
            return Err(invalid());
        }

        let first_day = first_day_of_month(year, month).ok_or_else(invalid)?;
        let last_day = last_day_of_month(year, month).ok_or_else(invalid)?;
        let anchor_day = prev_month_end(first_day).ok_or_else(invalid)?;

        Ok(Self {
            month,
            year,
            first_day,
            last_day,
            anchor_day,
        })
    }

    /// Parses "YYYY-MM".
    pub fn parse(period: &str) -> Result<Self> {
        let (year, month) = parse_period_string(period)?;
        Self::new(month, year)
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    pub fn anchor_day(&self) -> NaiveDate {
        self.anchor_day
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day && date <= self.last_day
    }

    /// In-period days, ascending. The anchor day is not included.
    pub fn days(&self) -> Vec<NaiveDate> {
        days_in_range(self.first_day, self.last_day)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
