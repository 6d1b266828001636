use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeterDeltaError {
    #[error("Invalid period {month}/{year}: month must be between 1 and 12 and the year representable")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("Invalid period string '{0}': expected YYYY-MM")]
    InvalidPeriodString(String),

    #[error("Date format '{format}' does not parse the reference sample '{sample}'")]
    InvalidDateFormat { format: String, sample: String },

    #[error("No meter columns configured: at least one tracked meter is required")]
    EmptyMeterSchema,

    #[error("Date column '{0}' not found in source table")]
    MissingDateColumn(String),

    #[error("External identifier '{external}' is targeted by both '{first}' and '{second}'")]
    DuplicateExternalIdentifier {
        external: String,
        first: String,
        second: String,
    },

    #[error("Meter mapping contains an empty label (internal '{internal}', external '{external}')")]
    EmptyMeterLabel { internal: String, external: String },

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MeterDeltaError>;
