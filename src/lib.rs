//! # Clinic Registrations
//!
//! A library for turning a clinic's visit-registration workbook (one sheet per
//! month, one row per specialty, one column per registration channel) into a
//! single canonical table, and for answering range-filtered questions about it.
//!
//! ## Core Concepts
//!
//! - **Period**: A calendar month, recovered from each sheet's name ("Jan-24", "Tháng 3 2024", "2024-05")
//! - **Channel**: One of four intake paths (Bàn Khám, PKH, Tổng đài, UMC Care)
//! - **Canonical Table**: One row per (period, specialty) with all four channel counts and a recomputed Grand Total
//! - **Filtered View**: The rows inside an inclusive month range plus the full month scaffold for charting
//! - **Build Warnings**: Skipped sheets, coerced cells, merged duplicates; reported, never fatal
//!
//! ## Example
//!
//! ```rust,ignore
//! use clinic_registrations::*;
//!
//! let bytes = std::fs::read("registrations.xlsx")?;
//! let mut session = process_workbook_bytes(&bytes, &IngestionConfig::default())?;
//!
//! for warning in session.warnings() {
//!     println!("{}", warning);
//! }
//!
//! session.select_range(Period::new(2024, 1).unwrap(), Period::new(2024, 6).unwrap())?;
//! let overview = session.overview();
//! println!("{} registrations, top channel {:?}", overview.total, overview.top_channel);
//!
//! let csv = session.detail(DetailMode::Full).to_csv_string()?;
//! ```

pub mod aggregate;
pub mod builder;
pub mod config;
pub mod error;
pub mod filter;
pub mod legacy;
pub mod normalizer;
pub mod period;
pub mod schema;
pub mod session;
pub mod sheet;
pub mod table;
pub mod utils;
pub mod views;
pub mod workbook;

pub use aggregate::*;
pub use builder::{build_table, BuildReport, BuildWarning, TableBuilder};
pub use config::IngestionConfig;
pub use error::{RegistrationError, Result};
pub use filter::{filter, filter_periods, DateRange, FilteredView};
pub use legacy::{detect_layout, SheetLayout};
pub use normalizer::{coerce_count, normalize_sheet, CountCell, NormalizedSheet, SkipReason};
pub use period::parse_sheet_label;
pub use schema::*;
pub use session::Session;
pub use sheet::{CellValue, RawSheet};
pub use table::CanonicalTable;
pub use views::*;
pub use workbook::{read_workbook_bytes, read_workbook_path};

use log::{debug, info};
use std::path::Path;

pub struct RegistrationProcessor;

impl RegistrationProcessor {
    pub fn process(sheets: &[RawSheet], config: &IngestionConfig) -> Result<BuildReport> {
        config.validate()?;

        info!("Processing registration workbook with {} sheet(s)", sheets.len());
        debug!(
            "Configuration: {} specialty column name(s), {} exclusion term(s)",
            config.specialty_columns.len(),
            config.exclusion_terms.len()
        );

        let report = build_table(sheets, config)?;

        info!(
            "Built table of {} rows from {} of {} sheet(s), {} warning(s)",
            report.table.len(),
            report.sheets_used,
            report.sheets_read,
            report.warnings.len()
        );

        Ok(report)
    }

    pub fn process_bytes(bytes: &[u8], config: &IngestionConfig) -> Result<Session> {
        let sheets = read_workbook_bytes(bytes)?;
        let report = Self::process(&sheets, config)?;
        Session::from_report(report, config.clone())
    }

    pub fn process_path(path: impl AsRef<Path>, config: &IngestionConfig) -> Result<Session> {
        let sheets = read_workbook_path(path)?;
        let report = Self::process(&sheets, config)?;
        Session::from_report(report, config.clone())
    }
}

pub fn process_sheets(sheets: &[RawSheet], config: &IngestionConfig) -> Result<BuildReport> {
    RegistrationProcessor::process(sheets, config)
}

/// Reads an uploaded workbook and returns a session whose range covers all
/// of its data.
pub fn process_workbook_bytes(bytes: &[u8], config: &IngestionConfig) -> Result<Session> {
    RegistrationProcessor::process_bytes(bytes, config)
}

pub fn process_workbook_path(path: impl AsRef<Path>, config: &IngestionConfig) -> Result<Session> {
    RegistrationProcessor::process_path(path, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(label: &str, rows: Vec<(&str, f64, f64)>) -> RawSheet {
        RawSheet::from_grid(
            label,
            &["Chuyên khoa", "Bàn Khám", "PKH", "Grand Total"],
            rows.into_iter()
                .map(|(s, a, b)| vec![s.into(), a.into(), b.into(), (a + b).into()])
                .collect(),
        )
    }

    #[test]
    fn test_end_to_end_processing() {
        let sheets = vec![
            sheet("Jan-24", vec![("Tim mạch", 10.0, 5.0), ("Nhi", 2.0, 1.0)]),
            sheet("Feb-24", vec![("Tim mạch", 3.0, 0.0)]),
        ];

        let report = process_sheets(&sheets, &IngestionConfig::default()).unwrap();
        assert_eq!(report.table.len(), 3);
        assert_eq!(report.sheets_used, 2);

        let range =
            DateRange::new(Period::new(2024, 1).unwrap(), Period::new(2024, 2).unwrap()).unwrap();
        let view = filter(&report.table, range);
        assert_eq!(grand_sum(&view), 21);
        assert_eq!(by_specialty(&view).get("Tim mạch"), Some(&18));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = IngestionConfig {
            specialty_columns: vec![],
            ..IngestionConfig::default()
        };
        let err = process_sheets(&[], &config).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidConfig(_)));
    }

    #[test]
    fn test_no_recognizable_sheets_is_fatal() {
        let sheets = vec![sheet("Summary", vec![("Nhi", 1.0, 1.0)])];
        let err = process_sheets(&sheets, &IngestionConfig::default()).unwrap_err();
        assert!(matches!(err, RegistrationError::NoValidSheets));
    }
}
