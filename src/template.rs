use crate::error::{MeterDeltaError, Result};
use crate::identity::MeterIdentityResolver;
use crate::output::DeltaRecord;
use crate::schema::DateFormat;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

pub const TIME_COLUMN: &str = "Time";
pub const REFERENCE_METER_COLUMN: &str = "Reference Meter";
pub const READING_COLUMN: &str = "Solar Energy Meter Reading";

/// One line of the downstream import template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRow {
    pub time: NaiveDateTime,
    pub reference_meter: String,
    pub reading: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportTemplate {
    pub rows: Vec<TemplateRow>,
    /// Date part of the time column, used for both reading and writing.
    #[serde(default)]
    pub time_format: DateFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFill {
    pub template: ImportTemplate,
    pub filled: usize,
    /// Reference meters with no source column behind them, first-seen order.
    pub unsourced: Vec<String>,
    /// Rows with a source meter but no delta for that day.
    pub unmatched: Vec<(NaiveDate, String)>,
}

impl ImportTemplate {
    pub fn new(rows: Vec<TemplateRow>, time_format: DateFormat) -> Self {
        Self { rows, time_format }
    }

    /// Reads a template export. The time column must carry a date in
    /// `time_format` followed by `HH:MM:SS`, and an existing reading must be
    /// blank or numeric; any row that breaks either is an error, since the
    /// template defines the downstream's expected rows.
    pub fn from_csv_reader<R: Read>(reader: R, time_format: &DateFormat) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h == name);

        let time_idx = find(TIME_COLUMN).ok_or_else(|| {
            MeterDeltaError::TemplateError(format!("missing '{}' column", TIME_COLUMN))
        })?;
        let meter_idx = find(REFERENCE_METER_COLUMN).ok_or_else(|| {
            MeterDeltaError::TemplateError(format!("missing '{}' column", REFERENCE_METER_COLUMN))
        })?;
        let reading_idx = find(READING_COLUMN);

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let raw_time = record.get(time_idx).unwrap_or_default();

            let time = time_format.parse_datetime(raw_time).ok_or_else(|| {
                MeterDeltaError::TemplateError(format!(
                    "row {}: time '{}' does not match '{} %H:%M:%S'",
                    idx + 1,
                    raw_time,
                    time_format.pattern()
                ))
            })?;

            let raw_reading = reading_idx
                .and_then(|i| record.get(i))
                .unwrap_or_default();
            let reading = if raw_reading.is_empty() {
                None
            } else {
                let value = raw_reading.parse::<f64>().map_err(|_| {
                    MeterDeltaError::TemplateError(format!(
                        "row {}: reading '{}' is not numeric",
                        idx + 1,
                        raw_reading
                    ))
                })?;
                Some(value)
            };

            rows.push(TemplateRow {
                time,
                reference_meter: record.get(meter_idx).unwrap_or_default().to_string(),
                reading,
            });
        }

        Ok(Self {
            rows,
            time_format: time_format.clone(),
        })
    }

    /// Writes each row's delta for `(time.date(), reference meter)`.
    ///
    /// The reference meter is reverse-resolved to its source column; a
    /// reference meter that is itself a tracked, passed-through label also
    /// matches. Rows with nothing to write keep their previous reading.
    pub fn fill(
        &self,
        records: &[DeltaRecord],
        resolver: &MeterIdentityResolver,
        tracked: &[String],
    ) -> TemplateFill {
        let deltas: BTreeMap<(NaiveDate, &str), f64> = records
            .iter()
            .map(|r| ((r.source_day, r.internal_meter.as_str()), r.delta))
            .collect();

        let passed_through: BTreeSet<&str> = resolver.passed_through(tracked).into_iter().collect();

        let mut template = self.clone();
        let mut filled = 0;
        let mut unsourced: Vec<String> = Vec::new();
        let mut unmatched = Vec::new();

        for row in &mut template.rows {
            let reference = row.reference_meter.as_str();
            let internal = resolver
                .to_internal(reference)
                .or_else(|| passed_through.get(reference).copied());

            let Some(internal) = internal else {
                if !unsourced.iter().any(|u| u == reference) {
                    warn!("Template meter '{}' has no source column", reference);
                    unsourced.push(reference.to_string());
                }
                continue;
            };

            let day = row.time.date();
            match deltas.get(&(day, internal)) {
                Some(delta) => {
                    row.reading = Some(*delta);
                    filled += 1;
                }
                None => unmatched.push((day, reference.to_string())),
            }
        }

        debug!(
            "Filled {} of {} template rows ({} unmatched)",
            filled,
            template.rows.len(),
            unmatched.len()
        );

        TemplateFill {
            template,
            filled,
            unsourced,
            unmatched,
        }
    }

    /// Writes the template back in the time format it was read with.
    pub fn to_csv(&self) -> Result<String> {
        let time_pattern = format!("{} %H:%M:%S", self.time_format.pattern());
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([TIME_COLUMN, REFERENCE_METER_COLUMN, READING_COLUMN])?;

        for row in &self.rows {
            writer.write_record([
                row.time.format(&time_pattern).to_string(),
                row.reference_meter.clone(),
                row.reading.map(|r| r.to_string()).unwrap_or_default(),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| {
            MeterDeltaError::IoError(std::io::Error::new(e.error().kind(), e.to_string()))
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
