use crate::error::{MeterDeltaError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Explicit day/month/year ordering of the source's date cells.
///
/// The format is never inferred per row: the same pattern is applied to every
/// row of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DateFormat {
    #[schemars(description = "Day first, e.g. 31/01/2024 (%d/%m/%Y)")]
    DayFirst,

    #[schemars(description = "Month first, e.g. 01/31/2024 (%m/%d/%Y)")]
    MonthFirst,

    #[schemars(description = "ISO 8601 calendar date, e.g. 2024-01-31 (%Y-%m-%d)")]
    Iso,

    #[schemars(description = "Any chrono strftime pattern describing a calendar date")]
    Custom(String),
}

impl DateFormat {
    pub fn pattern(&self) -> &str {
        match self {
            DateFormat::DayFirst => "%d/%m/%Y",
            DateFormat::MonthFirst => "%m/%d/%Y",
            DateFormat::Iso => "%Y-%m-%d",
            DateFormat::Custom(pattern) => pattern,
        }
    }

    /// Parses a date cell. A trailing `HH:MM:SS` time, as spreadsheet exports
    /// often carry, is accepted and discarded.
    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        NaiveDate::parse_from_str(raw, self.pattern())
            .ok()
            .or_else(|| self.parse_datetime(raw).map(|dt| dt.date()))
    }

    /// Parses a date-time cell whose date part follows this format and whose
    /// time part is `%H:%M:%S`.
    pub fn parse_datetime(&self, raw: &str) -> Option<NaiveDateTime> {
        let pattern = format!("{} %H:%M:%S", self.pattern());
        NaiveDateTime::parse_from_str(raw.trim(), &pattern).ok()
    }

    /// Checks the format against a known-good sample before any bulk parsing.
    pub fn validate_sample(&self, sample: &str) -> Result<NaiveDate> {
        self.parse_date(sample)
            .ok_or_else(|| MeterDeltaError::InvalidDateFormat {
                format: self.pattern().to_string(),
                sample: sample.to_string(),
            })
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self::DayFirst
    }
}

/// What to do with a tracked meter that has no external identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum UnmappedPolicy {
    #[schemars(description = "Emit records under the internal label, tagged as pass-through")]
    PassThrough,

    #[schemars(description = "Emit no records for the meter; report it as a diagnostic")]
    Drop,
}

impl Default for UnmappedPolicy {
    fn default() -> Self {
        Self::PassThrough
    }
}

/// Internal (source column) label to external (downstream reference) label.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(transparent)]
pub struct MeterMapping(BTreeMap<String, String>);

impl MeterMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, internal: impl Into<String>, external: impl Into<String>) {
        self.0.insert(internal.into(), external.into());
    }

    pub fn get(&self, internal: &str) -> Option<&str> {
        self.0.get(internal).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<I, E> FromIterator<(I, E)> for MeterMapping
where
    I: Into<String>,
    E: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (I, E)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(i, e)| (i.into(), e.into()))
                .collect(),
        )
    }
}

fn default_date_column() -> String {
    "Date".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default = "default_date_column")]
    #[schemars(description = "Header of the date-valued column in the source table. Defaults to 'Date'.")]
    pub date_column: String,

    #[serde(default)]
    #[schemars(description = "Day/month/year ordering of the date column. Applied to every row.")]
    pub date_format: DateFormat,

    #[serde(default)]
    #[schemars(
        description = "A date string known to be in the source's format (e.g. '31/01/2024'). When present the run fails unless the configured format parses it."
    )]
    pub date_sample: Option<String>,

    #[schemars(
        description = "Tracked meter column headers, in the order records should be emitted for each day."
    )]
    pub meters: Vec<String>,

    #[schemars(
        description = "Mapping from source column label to the downstream reference meter identifier."
    )]
    pub mapping: MeterMapping,

    #[serde(default)]
    #[schemars(description = "Handling of tracked meters missing from the mapping. Defaults to PassThrough.")]
    pub unmapped_policy: UnmappedPolicy,
}

impl EngineConfig {
    pub fn new(meters: Vec<String>, mapping: MeterMapping, date_format: DateFormat) -> Self {
        Self {
            date_column: default_date_column(),
            date_format,
            date_sample: None,
            meters,
            mapping,
            unmapped_policy: UnmappedPolicy::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Structural checks that abort a run. Mapping consistency is checked by
    /// the identity resolver.
    pub fn validate(&self) -> Result<()> {
        if self.meters.is_empty() {
            return Err(MeterDeltaError::EmptyMeterSchema);
        }

        if let Some(sample) = &self.date_sample {
            self.date_format.validate_sample(sample)?;
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
