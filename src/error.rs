use crate::schema::Period;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("No valid sheets found: no specialty rows remain after parsing and exclusion")]
    NoValidSheets,

    #[error("The workbook does not contain any sheets")]
    EmptyWorkbook,

    #[error("Could not read the workbook: {0}")]
    Workbook(String),

    #[error("Invalid range: end period {end} is before start period {start}")]
    InvalidRange { start: Period, end: Period },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown registration channel: {0}")]
    UnknownChannel(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
