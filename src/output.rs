use crate::delta::MeterDelta;
use crate::diagnostics::Diagnostic;
use crate::error::{MeterDeltaError, Result};
use crate::identity::{IdentityStatus, MeterIdentityResolver};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Time-of-day stamped on every record: production accrued by end of day.
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default()
}

/// Rendering used by the downstream import template's time column.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub timestamp: NaiveDateTime,
    /// Downstream identifier, or the internal label when passed through.
    pub meter: String,
    pub identity: IdentityStatus,
    pub delta: f64,
    pub source_day: NaiveDate,
    pub internal_meter: String,
}

impl DeltaRecord {
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn is_pass_through(&self) -> bool {
        self.identity == IdentityStatus::PassThrough
    }
}

pub struct OutputAssembler<'a> {
    resolver: &'a MeterIdentityResolver,
}

impl<'a> OutputAssembler<'a> {
    pub fn new(resolver: &'a MeterIdentityResolver) -> Self {
        Self { resolver }
    }

    /// Decorates deltas with external identifiers, keeping their order.
    ///
    /// Each tracked meter lacking a mapping is reported once. Whether its
    /// records are kept depends on the resolver's policy.
    pub fn assemble(
        &self,
        deltas: &[MeterDelta],
        meters: &[String],
    ) -> (Vec<DeltaRecord>, Vec<Diagnostic>) {
        let diagnostics: Vec<Diagnostic> = meters
            .iter()
            .filter(|meter| self.resolver.mapped_external(meter).is_none())
            .map(|meter| {
                warn!(
                    "Meter '{}' has no external identifier ({:?})",
                    meter,
                    self.resolver.policy()
                );
                Diagnostic::UnresolvedIdentity {
                    meter: meter.clone(),
                    policy: self.resolver.policy(),
                }
            })
            .collect();

        let records: Vec<DeltaRecord> = deltas
            .iter()
            .filter_map(|delta| {
                let resolved = self.resolver.to_external(&delta.meter)?;
                Some(DeltaRecord {
                    timestamp: delta.date.and_time(end_of_day()),
                    meter: resolved.id,
                    identity: resolved.status,
                    delta: delta.delta,
                    source_day: delta.date,
                    internal_meter: delta.meter.clone(),
                })
            })
            .collect();

        debug!(
            "Assembled {} records from {} deltas",
            records.len(),
            deltas.len()
        );

        (records, diagnostics)
    }
}

/// Row-oriented export matching the downstream import template columns.
pub fn records_to_csv(records: &[DeltaRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Time", "Reference Meter", "Solar Energy Meter Reading"])?;

    for record in records {
        writer.write_record([
            record.timestamp_string(),
            record.meter.clone(),
            record.delta.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| MeterDeltaError::IoError(std::io::Error::new(e.error().kind(), e.to_string())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn records_to_json(records: &[DeltaRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MeterMapping, UnmappedPolicy};

    fn delta(day: u32, meter: &str, value: f64) -> MeterDelta {
        let date = NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        MeterDelta {
            date,
            meter: meter.to_string(),
            delta: value,
            previous_date: date.pred_opt().unwrap(),
        }
    }

    fn mapping() -> MeterMapping {
        [("A", "ext-A")].into_iter().collect()
    }

    fn tracked() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_pass_through_records_keep_internal_label() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::PassThrough).unwrap();
        let deltas = vec![delta(1, "A", 10.0), delta(1, "B", 4.0)];
        let (records, diagnostics) = OutputAssembler::new(&resolver).assemble(&deltas, &tracked());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].meter, "ext-A");
        assert_eq!(records[0].identity, IdentityStatus::Mapped);
        assert_eq!(records[1].meter, "B");
        assert!(records[1].is_pass_through());
        assert_eq!(
            diagnostics,
            vec![Diagnostic::UnresolvedIdentity {
                meter: "B".to_string(),
                policy: UnmappedPolicy::PassThrough
            }]
        );
    }

    #[test]
    fn test_drop_policy_removes_unmapped_records() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::Drop).unwrap();
        let deltas = vec![delta(1, "A", 10.0), delta(1, "B", 4.0), delta(2, "A", 3.5)];
        let (records, diagnostics) = OutputAssembler::new(&resolver).assemble(&deltas, &tracked());

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.meter == "ext-A"));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_timestamp_is_end_of_day() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::PassThrough).unwrap();
        let (records, _) =
            OutputAssembler::new(&resolver).assemble(&[delta(29, "A", 1.0)], &tracked());

        assert_eq!(records[0].timestamp_string(), "29/02/2024 23:59:00");
        assert_eq!(records[0].source_day, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_records_to_csv() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::PassThrough).unwrap();
        let (records, _) = OutputAssembler::new(&resolver)
            .assemble(&[delta(1, "A", 10.0), delta(1, "B", -2.5)], &tracked());

        let csv = records_to_csv(&records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Time,Reference Meter,Solar Energy Meter Reading");
        assert_eq!(lines[1], "01/02/2024 23:59:00,ext-A,10");
        assert_eq!(lines[2], "01/02/2024 23:59:00,B,-2.5");

        let json = records_to_json(&records).unwrap();
        assert!(json.contains("\"identity\": \"PassThrough\""));
    }
}
