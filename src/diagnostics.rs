use crate::delta::MissingDataEvent;
use crate::schema::UnmappedPolicy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A recoverable problem found during a run. None of these abort processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Source row dropped because its date could not be read.
    MalformedInputRow {
        row: usize,
        raw_date: String,
        reason: String,
    },
    /// Source row ignored because an earlier row carries the same date.
    DuplicateDate { row: usize, date: NaiveDate },
    MissingMeterColumn { meter: String },
    MissingReading(MissingDataEvent),
    /// Tracked meter with no external identifier.
    UnresolvedIdentity {
        meter: String,
        policy: UnmappedPolicy,
    },
    /// Mapping target whose internal label is not tracked.
    UnsourcedExternal { external: String },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::MalformedInputRow { .. } => "malformed_input_row",
            Diagnostic::DuplicateDate { .. } => "duplicate_date",
            Diagnostic::MissingMeterColumn { .. } => "missing_meter_column",
            Diagnostic::MissingReading(_) => "missing_reading",
            Diagnostic::UnresolvedIdentity { .. } => "unresolved_identity",
            Diagnostic::UnsourcedExternal { .. } => "unsourced_external",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedInputRow {
                row,
                raw_date,
                reason,
            } => write!(f, "row {} dropped (date '{}'): {}", row, raw_date, reason),
            Diagnostic::DuplicateDate { row, date } => {
                write!(f, "row {} ignored: date {} already loaded", row, date)
            }
            Diagnostic::MissingMeterColumn { meter } => {
                write!(f, "meter '{}' has no column in the source", meter)
            }
            Diagnostic::MissingReading(event) => write!(
                f,
                "no delta for '{}' on {}: {}",
                event.meter, event.date, event.reason
            ),
            Diagnostic::UnresolvedIdentity { meter, policy } => write!(
                f,
                "meter '{}' has no external identifier ({:?})",
                meter, policy
            ),
            Diagnostic::UnsourcedExternal { external } => {
                write!(f, "external meter '{}' has no tracked source column", external)
            }
        }
    }
}
