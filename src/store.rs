use crate::diagnostics::Diagnostic;
use crate::ingestion::Cell;
use crate::period::Period;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One dated source row: meter label to raw cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// 1-based data row number in the source table.
    pub row: usize,
    pub date: NaiveDate,
    pub values: BTreeMap<String, Cell>,
}

impl RawReading {
    pub fn value(&self, meter: &str) -> Option<&Cell> {
        self.values.get(meter)
    }
}

/// In-memory index of raw readings, at most one per date.
#[derive(Debug, Clone, Default)]
pub struct ReadingStore {
    rows: BTreeMap<NaiveDate, RawReading>,
}

impl ReadingStore {
    /// Indexes rows by date. The first row for a date wins; later rows for
    /// the same date are reported as duplicates.
    pub fn load(rows: Vec<RawReading>) -> (Self, Vec<Diagnostic>) {
        let mut store: BTreeMap<NaiveDate, RawReading> = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for reading in rows {
            if let Some(existing) = store.get(&reading.date) {
                warn!(
                    "Row {} repeats date {} (already loaded from row {}); ignoring it",
                    reading.row, reading.date, existing.row
                );
                diagnostics.push(Diagnostic::DuplicateDate {
                    row: reading.row,
                    date: reading.date,
                });
                continue;
            }
            store.insert(reading.date, reading);
        }

        debug!("Reading store loaded {} dated rows", store.len());

        (Self { rows: store }, diagnostics)
    }

    pub fn row_at(&self, date: NaiveDate) -> Option<&RawReading> {
        self.rows.get(&date)
    }

    /// Rows dated within `[first_day, last_day]` of the period, ascending.
    pub fn rows_in_period(&self, period: &Period) -> Vec<&RawReading> {
        self.rows
            .range(period.first_day()..=period.last_day())
            .map(|(_, row)| row)
            .collect()
    }

    pub fn dates_in_period(&self, period: &Period) -> Vec<NaiveDate> {
        self.rows
            .range(period.first_day()..=period.last_day())
            .map(|(date, _)| *date)
            .collect()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.keys().next()?;
        let last = self.rows.keys().next_back()?;
        Some((*first, *last))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(row: usize, y: i32, m: u32, d: u32, value: f64) -> RawReading {
        RawReading {
            row,
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            values: BTreeMap::from([("M1".to_string(), Cell::Number(value))]),
        }
    }

    #[test]
    fn test_rows_in_period_excludes_anchor_and_next_month() {
        let (store, diagnostics) = ReadingStore::load(vec![
            reading(1, 2024, 3, 1, 140.0),
            reading(2, 2024, 2, 2, 125.0),
            reading(3, 2024, 1, 31, 100.0),
            reading(4, 2024, 2, 1, 110.0),
            reading(5, 2024, 2, 29, 300.0),
        ]);
        assert!(diagnostics.is_empty());

        let period = Period::new(2, 2024).unwrap();
        let dates = store.dates_in_period(&period);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            ]
        );
        assert_eq!(store.rows_in_period(&period)[0].row, 4);
        assert!(store.row_at(period.anchor_day()).is_some());
        assert_eq!(
            store.date_range(),
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
            ))
        );
    }

    #[test]
    fn test_duplicate_dates_keep_first_row() {
        let (store, diagnostics) = ReadingStore::load(vec![
            reading(1, 2024, 2, 1, 110.0),
            reading(2, 2024, 2, 1, 999.0),
        ]);
        assert_eq!(store.len(), 1);
        let row = store
            .row_at(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
            .unwrap();
        assert_eq!(row.value("M1"), Some(&Cell::Number(110.0)));
        assert_eq!(
            diagnostics,
            vec![Diagnostic::DuplicateDate {
                row: 2,
                date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
            }]
        );
    }

    #[test]
    fn test_row_at_absent() {
        let (store, _) = ReadingStore::load(vec![]);
        assert!(store.is_empty());
        assert!(store
            .row_at(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
            .is_none());
        assert_eq!(store.date_range(), None);
    }
}
