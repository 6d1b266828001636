//! # Meter Delta Builder
//!
//! A library for converting cumulative daily meter readings (e.g. solar
//! production counters recorded once per day) into per-day production deltas
//! tagged with the meter identifiers a downstream reporting system expects.
//!
//! ## Core Concepts
//!
//! - **Period**: the target month plus its anchor day, the last day of the
//!   previous month, whose reading seeds the first day's delta
//! - **Reading Store**: dated source rows, one per calendar day
//! - **Delta**: today's cumulative reading minus yesterday's; gaps are
//!   reported, never bridged
//! - **Identity Resolution**: source column labels mapped to downstream
//!   reference meters, with an explicit policy for unmapped meters
//! - **Diagnostics**: every dropped row, missing reading and unresolved
//!   meter is returned next to the records
//!
//! ## Example
//!
//! ```rust,ignore
//! use meter_delta_builder::*;
//!
//! let config = EngineConfig::from_json(r#"{
//!     "date_format": "MonthFirst",
//!     "date_sample": "01/31/2024",
//!     "meters": ["JAFZA 4", "AFR"],
//!     "mapping": { "JAFZA 4": "JAFZA 4-Meter 1", "AFR": "DWC-AFR-Meter 2" }
//! }"#)?;
//!
//! let table = SourceTable::from_csv_reader(std::fs::File::open("solar.csv")?)?;
//! let report = process_meter_readings(&config, &table, Period::new(2, 2024)?)?;
//!
//! for record in &report.records {
//!     println!("{} {} {}", record.timestamp_string(), record.meter, record.delta);
//! }
//! for diagnostic in &report.diagnostics {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

pub mod delta;
pub mod diagnostics;
pub mod error;
pub mod identity;
pub mod ingestion;
pub mod output;
pub mod period;
pub mod schema;
pub mod store;
pub mod template;
pub mod utils;

pub use delta::{coerce_reading, DeltaCalculator, DeltaOutcome, MeterDelta, MissingDataEvent, MissingReason};
pub use diagnostics::Diagnostic;
pub use error::{MeterDeltaError, Result};
pub use identity::{IdentityStatus, MeterIdentityResolver, ResolvedMeter};
pub use ingestion::{Cell, SourceTable};
pub use output::{end_of_day, records_to_csv, records_to_json, DeltaRecord, OutputAssembler};
pub use period::Period;
pub use schema::*;
pub use store::{RawReading, ReadingStore};
pub use template::{ImportTemplate, TemplateFill, TemplateRow};

use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything one run produces: the records and the diagnostics, always
/// together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub period: Period,
    pub records: Vec<DeltaRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn missing_data(&self) -> impl Iterator<Item = &MissingDataEvent> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::MissingReading(event) => Some(event),
            _ => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostic counts per kind.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            *counts.entry(diagnostic.kind()).or_insert(0) += 1;
        }
        counts
    }
}

pub struct MeterDeltaProcessor;

impl MeterDeltaProcessor {
    /// Runs the whole pipeline for one period.
    ///
    /// Only structural problems (invalid configuration, conflicting mapping,
    /// missing date column) return `Err`; everything else is reported in
    /// [`RunReport::diagnostics`].
    pub fn process(config: &EngineConfig, table: &SourceTable, period: Period) -> Result<RunReport> {
        config.validate()?;
        let resolver = MeterIdentityResolver::new(&config.mapping, config.unmapped_policy)?;
        resolver.check_tracked(&config.meters)?;

        info!(
            "Processing {} meter(s) for period {} (anchor {})",
            config.meters.len(),
            period,
            period.anchor_day()
        );

        let mut diagnostics = Vec::new();

        let (readings, ingest_diagnostics) = table.to_raw_readings(config)?;
        diagnostics.extend(ingest_diagnostics);

        let (store, store_diagnostics) = ReadingStore::load(readings);
        diagnostics.extend(store_diagnostics);
        debug!(
            "{} of {} source rows dated within {}",
            store.rows_in_period(&period).len(),
            table.rows.len(),
            period
        );

        let outcome = DeltaCalculator::new(&store, &config.meters).compute(&period);
        diagnostics.extend(outcome.missing.into_iter().map(Diagnostic::MissingReading));

        let (records, identity_diagnostics) =
            OutputAssembler::new(&resolver).assemble(&outcome.deltas, &config.meters);
        diagnostics.extend(identity_diagnostics);

        diagnostics.extend(
            resolver
                .unsourced_externals(&config.meters)
                .into_iter()
                .map(|external| Diagnostic::UnsourcedExternal {
                    external: external.to_string(),
                }),
        );

        let report = RunReport {
            period,
            records,
            diagnostics,
        };

        info!(
            "Produced {} records for {} with {} diagnostic(s)",
            report.records.len(),
            period,
            report.diagnostics.len()
        );
        for (kind, count) in report.summary() {
            debug!("  {}: {}", kind, count);
        }

        Ok(report)
    }
}

pub fn process_meter_readings(
    config: &EngineConfig,
    table: &SourceTable,
    period: Period,
) -> Result<RunReport> {
    MeterDeltaProcessor::process(config, table, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(rows: &[(&str, &[Cell])]) -> SourceTable {
        SourceTable::new(
            vec!["Date".to_string(), "A".to_string(), "B".to_string()],
            rows.iter()
                .map(|(date, cells)| {
                    let mut row = vec![Cell::Text(date.to_string())];
                    row.extend(cells.iter().cloned());
                    row
                })
                .collect(),
        )
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::new(
            vec!["A".to_string(), "B".to_string()],
            [("A", "ext-A")].into_iter().collect(),
            DateFormat::Iso,
        );
        config.date_sample = Some("2024-01-31".to_string());
        config
    }

    #[test]
    fn test_end_to_end_processing() {
        let table = table(&[
            ("2024-01-31", &[Cell::Number(100.0), Cell::Number(50.0)]),
            ("2024-02-01", &[Cell::Number(110.0), Cell::Number(55.0)]),
            ("not a date", &[Cell::Number(0.0), Cell::Number(0.0)]),
        ]);

        let report = process_meter_readings(&config(), &table, Period::new(2, 2024).unwrap()).unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].meter, "ext-A");
        assert_eq!(report.records[0].delta, 10.0);
        assert_eq!(report.records[1].meter, "B");
        assert_eq!(report.records[1].delta, 5.0);
        assert_eq!(
            report.records[1].source_day,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );

        let summary = report.summary();
        assert_eq!(summary.get("malformed_input_row"), Some(&1));
        assert_eq!(summary.get("unresolved_identity"), Some(&1));
        // Feb 2..=29, two meters each.
        assert_eq!(summary.get("missing_reading"), Some(&56));
        assert_eq!(report.missing_data().count(), 56);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_structural_errors_abort() {
        let table = table(&[]);
        let period = Period::new(2, 2024).unwrap();

        let mut bad_sample = config();
        bad_sample.date_format = DateFormat::DayFirst;
        assert!(matches!(
            process_meter_readings(&bad_sample, &table, period),
            Err(MeterDeltaError::InvalidDateFormat { .. })
        ));

        let mut duplicate = config();
        duplicate.mapping.insert("B", "ext-A");
        assert!(matches!(
            process_meter_readings(&duplicate, &table, period),
            Err(MeterDeltaError::DuplicateExternalIdentifier { .. })
        ));

        let mut shadowed = config();
        shadowed.mapping.insert("A", "B");
        assert!(matches!(
            process_meter_readings(&shadowed, &table, period),
            Err(MeterDeltaError::DuplicateExternalIdentifier { ref external, .. }) if external == "B"
        ));
    }

    #[test]
    fn test_unsourced_external_reported() {
        let mut config = config();
        config.mapping.insert("C", "ext-C");
        let table = table(&[]);

        let report = process_meter_readings(&config, &table, Period::new(2, 2024).unwrap()).unwrap();
        assert!(report.records.is_empty());
        assert!(report.diagnostics.contains(&Diagnostic::UnsourcedExternal {
            external: "ext-C".to_string()
        }));
    }
}
