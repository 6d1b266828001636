use crate::diagnostics::Diagnostic;
use crate::error::{MeterDeltaError, Result};
use crate::schema::EngineConfig;
use crate::store::RawReading;
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// One cell of the already-parsed source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    /// Reads a CSV field: blank is `Empty`, anything `f64` accepts is `Number`.
    pub fn from_field(field: &str) -> Self {
        let field = field.trim();
        if field.is_empty() {
            return Cell::Empty;
        }
        match field.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(field.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Raw text as it appeared in the source, for diagnostics.
    pub fn raw(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A header row plus data rows, as handed over by the spreadsheet layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SourceTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::from_field).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name.trim())
    }

    /// Turns table rows into dated readings for the tracked meters.
    ///
    /// Rows whose date cell is empty or does not match the configured format
    /// are dropped and reported. A tracked meter without a column is reported
    /// once; its readings are then simply absent.
    pub fn to_raw_readings(&self, config: &EngineConfig) -> Result<(Vec<RawReading>, Vec<Diagnostic>)> {
        let date_idx = self
            .column_index(&config.date_column)
            .ok_or_else(|| MeterDeltaError::MissingDateColumn(config.date_column.clone()))?;

        let mut diagnostics = Vec::new();

        let mut meter_columns = Vec::with_capacity(config.meters.len());
        for meter in &config.meters {
            match self.column_index(meter) {
                Some(idx) => meter_columns.push((meter.as_str(), idx)),
                None => {
                    warn!("Tracked meter '{}' has no column in the source table", meter);
                    diagnostics.push(Diagnostic::MissingMeterColumn {
                        meter: meter.clone(),
                    });
                }
            }
        }

        let mut readings = Vec::with_capacity(self.rows.len());

        for (idx, row) in self.rows.iter().enumerate() {
            let row_number = idx + 1;
            let date_cell = row.get(date_idx).cloned().unwrap_or_default();

            let date = match parse_date_cell(&date_cell, config) {
                Ok(date) => date,
                Err(reason) => {
                    warn!("Dropping row {}: {}", row_number, reason);
                    diagnostics.push(Diagnostic::MalformedInputRow {
                        row: row_number,
                        raw_date: date_cell.raw(),
                        reason,
                    });
                    continue;
                }
            };

            let values: BTreeMap<String, Cell> = meter_columns
                .iter()
                .map(|(meter, col)| {
                    (
                        meter.to_string(),
                        row.get(*col).cloned().unwrap_or_default(),
                    )
                })
                .collect();

            readings.push(RawReading {
                row: row_number,
                date,
                values,
            });
        }

        Ok((readings, diagnostics))
    }
}

fn parse_date_cell(cell: &Cell, config: &EngineConfig) -> std::result::Result<NaiveDate, String> {
    match cell {
        Cell::Date(date) => Ok(*date),
        Cell::Text(raw) if !raw.trim().is_empty() => {
            config.date_format.parse_date(raw).ok_or_else(|| {
                format!(
                    "'{}' does not match date format {}",
                    raw,
                    config.date_format.pattern()
                )
            })
        }
        // Compact dates such as 20240131 read as numbers from CSV.
        Cell::Number(n) => config
            .date_format
            .parse_date(&n.to_string())
            .ok_or_else(|| format!("numeric value {} is not a date", n)),
        _ => Err("date cell is empty".to_string()),
    }
}
