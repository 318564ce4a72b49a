use crate::config::IngestionConfig;
use crate::error::{RegistrationError, Result};
use crate::legacy::{
    detect_layout, normalize_quarter_positional, normalize_quarter_wide, LegacySheet, SheetLayout,
};
use crate::normalizer::{normalize_sheet, SkipReason};
use crate::period::parse_sheet_label;
use crate::schema::{Channel, RegistrationRow, RowKey};
use crate::sheet::RawSheet;
use crate::table::CanonicalTable;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// A recoverable condition met while building the table. None of these
/// stop the build; they are returned for the caller to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BuildWarning {
    UnrecognizedLabel {
        label: String,
    },
    SheetSkipped {
        label: String,
        reason: SkipReason,
    },
    CoercedCells {
        label: String,
        count: usize,
    },
    BlankSpecialtyRows {
        label: String,
        count: usize,
    },
    MissingChannels {
        label: String,
        channels: Vec<Channel>,
    },
    DuplicatesMerged {
        keys: Vec<RowKey>,
    },
    TruncatedLayout {
        label: String,
        columns: usize,
    },
    StatedTotalMismatch {
        label: String,
        keys: Vec<RowKey>,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::UnrecognizedLabel { label } => write!(
                f,
                "Skipped sheet '{}': could not recognize a month/year in its name",
                label
            ),
            BuildWarning::SheetSkipped { label, reason } => {
                write!(f, "Skipped sheet '{}': {}", label, reason)
            }
            BuildWarning::CoercedCells { label, count } => write!(
                f,
                "Sheet '{}': {} non-numeric count cell(s) were read as 0",
                label, count
            ),
            BuildWarning::BlankSpecialtyRows { label, count } => write!(
                f,
                "Sheet '{}': {} row(s) with counts but no specialty name were dropped",
                label, count
            ),
            BuildWarning::MissingChannels { label, channels } => {
                let names: Vec<&str> = channels.iter().map(|c| c.label()).collect();
                write!(
                    f,
                    "Sheet '{}' has no column for: {} (counted as 0)",
                    label,
                    names.join(", ")
                )
            }
            BuildWarning::DuplicatesMerged { keys } => {
                let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                write!(
                    f,
                    "Duplicate specialty rows in the same month were summed: {}",
                    names.join("; ")
                )
            }
            BuildWarning::TruncatedLayout { label, columns } => write!(
                f,
                "Quarter sheet '{}' has only {} column(s); missing channel slots are counted as absent",
                label, columns
            ),
            BuildWarning::StatedTotalMismatch { label, keys } => {
                let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                write!(
                    f,
                    "Sheet '{}': stated Grand Total differs from the channel sum for {} (channel sum used)",
                    label,
                    names.join("; ")
                )
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub table: CanonicalTable,
    pub warnings: Vec<BuildWarning>,
    pub sheets_read: usize,
    pub sheets_used: usize,
    /// Summary rows (Grand Total and the like) left out across all sheets.
    pub excluded_rows: usize,
}

impl BuildReport {
    pub fn merged_keys(&self) -> &[RowKey] {
        self.warnings
            .iter()
            .find_map(|w| match w {
                BuildWarning::DuplicatesMerged { keys } => Some(keys.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

pub struct TableBuilder<'a> {
    config: &'a IngestionConfig,
}

/// Accumulates rows and warnings across sheets.
#[derive(Default)]
struct BuildState {
    rows: Vec<RegistrationRow>,
    channels: Vec<Channel>,
    warnings: Vec<BuildWarning>,
    reported_labels: HashSet<String>,
    sheets_used: usize,
    excluded_rows: usize,
}

impl BuildState {
    fn skip(&mut self, label: &str, reason: SkipReason) {
        self.warnings.push(BuildWarning::SheetSkipped {
            label: label.to_string(),
            reason,
        });
    }

    fn coerced(&mut self, label: &str, count: usize) {
        if count > 0 {
            self.warnings.push(BuildWarning::CoercedCells {
                label: label.to_string(),
                count,
            });
        }
    }

    fn blank_specialties(&mut self, label: &str, count: usize) {
        if count > 0 {
            self.warnings.push(BuildWarning::BlankSpecialtyRows {
                label: label.to_string(),
                count,
            });
        }
    }

    fn accept_legacy(&mut self, sheet: LegacySheet) {
        self.coerced(&sheet.label, sheet.coerced_cells);
        self.blank_specialties(&sheet.label, sheet.blank_specialty_rows);
        self.excluded_rows += sheet.excluded_rows;
        if let Some(columns) = sheet.truncated_columns {
            self.warnings.push(BuildWarning::TruncatedLayout {
                label: sheet.label.clone(),
                columns,
            });
        }
        if !sheet.total_mismatches.is_empty() {
            self.warnings.push(BuildWarning::StatedTotalMismatch {
                label: sheet.label.clone(),
                keys: sheet.total_mismatches,
            });
        }
        for row in &sheet.rows {
            self.channels.extend(row.channels.present());
        }
        self.rows.extend(sheet.rows);
        self.sheets_used += 1;
    }
}

impl<'a> TableBuilder<'a> {
    pub fn new(config: &'a IngestionConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, sheets: &[RawSheet]) -> Result<BuildReport> {
        info!("Building registration table from {} sheet(s)", sheets.len());

        let mut state = BuildState::default();
        for sheet in sheets {
            self.ingest_sheet(sheet, &mut state);
        }

        if state.rows.is_empty() {
            for warning in &state.warnings {
                warn!("{}", warning);
            }
            return Err(RegistrationError::NoValidSheets);
        }

        let mut merged: BTreeMap<RowKey, RegistrationRow> = BTreeMap::new();
        let mut duplicate_keys: BTreeSet<RowKey> = BTreeSet::new();
        for row in state.rows {
            match merged.entry(row.key()) {
                Entry::Occupied(mut existing) => {
                    duplicate_keys.insert(existing.key().clone());
                    existing.get_mut().merge(&row);
                }
                Entry::Vacant(slot) => {
                    slot.insert(row);
                }
            }
        }

        if !duplicate_keys.is_empty() {
            state.warnings.push(BuildWarning::DuplicatesMerged {
                keys: duplicate_keys.into_iter().collect(),
            });
        }

        for warning in &state.warnings {
            warn!("{}", warning);
        }

        let table = CanonicalTable::from_rows(merged, state.channels);
        info!(
            "Processed {} of {} sheet(s) into {} (period, specialty) rows, {} summary row(s) excluded",
            state.sheets_used,
            sheets.len(),
            table.len(),
            state.excluded_rows
        );

        Ok(BuildReport {
            table,
            warnings: state.warnings,
            sheets_read: sheets.len(),
            sheets_used: state.sheets_used,
            excluded_rows: state.excluded_rows,
        })
    }

    fn ingest_sheet(&self, sheet: &RawSheet, state: &mut BuildState) {
        match detect_layout(sheet, self.config) {
            SheetLayout::Monthly => {
                let Some(period) = parse_sheet_label(&sheet.label) else {
                    if state.reported_labels.insert(sheet.label.clone()) {
                        state.warnings.push(BuildWarning::UnrecognizedLabel {
                            label: sheet.label.clone(),
                        });
                    }
                    return;
                };

                match normalize_sheet(sheet, period, self.config) {
                    Ok(normalized) => {
                        state.coerced(&normalized.label, normalized.coerced_cells);
                        state
                            .blank_specialties(&normalized.label, normalized.blank_specialty_rows);
                        state.excluded_rows += normalized.excluded_rows;
                        if !normalized.missing_channels.is_empty() {
                            state.warnings.push(BuildWarning::MissingChannels {
                                label: normalized.label.clone(),
                                channels: normalized.missing_channels,
                            });
                        }
                        state.channels.extend(normalized.present_channels);
                        state.rows.extend(normalized.rows);
                        state.sheets_used += 1;
                    }
                    Err(reason) => state.skip(&sheet.label, reason),
                }
            }
            SheetLayout::QuarterWide => {
                debug!("Sheet '{}' uses the quarter-wide layout", sheet.label);
                match normalize_quarter_wide(sheet, self.config) {
                    Ok(legacy) => state.accept_legacy(legacy),
                    Err(reason) => state.skip(&sheet.label, reason),
                }
            }
            SheetLayout::QuarterPositional { quarter, year } => {
                debug!(
                    "Sheet '{}' uses the positional quarter layout (Q{})",
                    sheet.label, quarter
                );
                match normalize_quarter_positional(sheet, quarter, year, self.config) {
                    Ok(legacy) => state.accept_legacy(legacy),
                    Err(reason) => state.skip(&sheet.label, reason),
                }
            }
        }
    }
}

pub fn build_table(sheets: &[RawSheet], config: &IngestionConfig) -> Result<BuildReport> {
    TableBuilder::new(config).build(sheets)
}
