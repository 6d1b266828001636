//! Day-over-day differences of cumulative meter readings.
//!
//! Each in-period day is compared against exactly one predecessor: the
//! previous calendar day, which for the first day of the month is the
//! period's anchor day. There is no multi-day lookback; a gap in the data
//! yields a [`MissingDataEvent`] rather than a delta spanning several days.

use crate::ingestion::Cell;
use crate::period::Period;
use crate::store::ReadingStore;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Production of one meter on one day, keyed by the internal label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterDelta {
    pub date: NaiveDate,
    pub meter: String,
    pub delta: f64,
    pub previous_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissingReason {
    NoCurrentRow,
    CurrentValueMissing,
    CurrentValueNotNumeric { raw: String },
    NoPreviousRow { previous: NaiveDate },
    PreviousValueMissing { previous: NaiveDate },
    PreviousValueNotNumeric { previous: NaiveDate, raw: String },
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::NoCurrentRow => write!(f, "no row for this date"),
            MissingReason::CurrentValueMissing => write!(f, "reading is blank"),
            MissingReason::CurrentValueNotNumeric { raw } => {
                write!(f, "reading '{}' is not numeric", raw)
            }
            MissingReason::NoPreviousRow { previous } => write!(f, "no row for {}", previous),
            MissingReason::PreviousValueMissing { previous } => {
                write!(f, "reading on {} is blank", previous)
            }
            MissingReason::PreviousValueNotNumeric { previous, raw } => {
                write!(f, "reading '{}' on {} is not numeric", raw, previous)
            }
        }
    }
}

/// A (date, meter) pair for which no delta could be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDataEvent {
    pub date: NaiveDate,
    pub meter: String,
    pub reason: MissingReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaOutcome {
    pub deltas: Vec<MeterDelta>,
    pub missing: Vec<MissingDataEvent>,
}

enum ValueProblem {
    Missing,
    NotNumeric(String),
}

/// Coerces a cell to a finite reading.
pub fn coerce_reading(cell: Option<&Cell>) -> Option<f64> {
    coerce(cell).ok()
}

fn coerce(cell: Option<&Cell>) -> std::result::Result<f64, ValueProblem> {
    match cell {
        None | Some(Cell::Empty) | Some(Cell::Date(_)) => Err(ValueProblem::Missing),
        Some(Cell::Number(n)) if n.is_finite() => Ok(*n),
        Some(Cell::Number(n)) => Err(ValueProblem::NotNumeric(n.to_string())),
        Some(Cell::Text(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(ValueProblem::Missing);
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(ValueProblem::NotNumeric(trimmed.to_string())),
            }
        }
    }
}

pub struct DeltaCalculator<'a> {
    store: &'a ReadingStore,
    meters: &'a [String],
}

impl<'a> DeltaCalculator<'a> {
    /// `meters` fixes both which columns are tracked and their output order.
    pub fn new(store: &'a ReadingStore, meters: &'a [String]) -> Self {
        Self { store, meters }
    }

    /// Computes every (day, meter) delta of the period. Results are ordered
    /// by date, then by position in the meter list.
    pub fn compute(&self, period: &Period) -> DeltaOutcome {
        let mut outcome = DeltaOutcome::default();

        for date in period.days() {
            let previous = previous_day(period, date);

            for meter in self.meters {
                match self.delta_for(date, previous, meter) {
                    Ok(delta) => outcome.deltas.push(MeterDelta {
                        date,
                        meter: meter.clone(),
                        delta,
                        previous_date: previous,
                    }),
                    Err(reason) => outcome.missing.push(MissingDataEvent {
                        date,
                        meter: meter.clone(),
                        reason,
                    }),
                }
            }
        }

        debug!(
            "Computed {} deltas for {} ({} pairs missing)",
            outcome.deltas.len(),
            period,
            outcome.missing.len()
        );

        outcome
    }

    fn delta_for(
        &self,
        date: NaiveDate,
        previous: NaiveDate,
        meter: &str,
    ) -> std::result::Result<f64, MissingReason> {
        let current_row = self.store.row_at(date).ok_or(MissingReason::NoCurrentRow)?;
        let current = coerce(current_row.value(meter)).map_err(|problem| match problem {
            ValueProblem::Missing => MissingReason::CurrentValueMissing,
            ValueProblem::NotNumeric(raw) => MissingReason::CurrentValueNotNumeric { raw },
        })?;

        let previous_row = self
            .store
            .row_at(previous)
            .ok_or(MissingReason::NoPreviousRow { previous })?;
        let prior = coerce(previous_row.value(meter)).map_err(|problem| match problem {
            ValueProblem::Missing => MissingReason::PreviousValueMissing { previous },
            ValueProblem::NotNumeric(raw) => MissingReason::PreviousValueNotNumeric { previous, raw },
        })?;

        Ok(current - prior)
    }
}

/// The single day a delta is measured against.
fn previous_day(period: &Period, date: NaiveDate) -> NaiveDate {
    if date == period.first_day() {
        return period.anchor_day();
    }
    date.pred_opt().unwrap_or(period.anchor_day())
}
