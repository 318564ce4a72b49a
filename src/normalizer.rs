use crate::config::IngestionConfig;
use crate::schema::{Channel, ChannelCounts, Period, RegistrationRow};
use crate::sheet::{CellValue, RawSheet};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a recognized sheet contributed nothing to the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    MissingSpecialtyColumn,
    NoDataAfterExclusion,
    MissingYear,
    EmptySheet,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingSpecialtyColumn => f.write_str("missing specialty column"),
            SkipReason::NoDataAfterExclusion => f.write_str("no data after exclusion"),
            SkipReason::MissingYear => {
                f.write_str("no year in sheet label and no legacy year configured")
            }
            SkipReason::EmptySheet => f.write_str("sheet has no data rows"),
        }
    }
}

/// Result of reading one count cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountCell {
    Value(u64),
    /// Blank cell, read as zero.
    Missing,
    /// Non-numeric or negative content, read as zero.
    Invalid,
}

impl CountCell {
    pub fn value(&self) -> u64 {
        match self {
            CountCell::Value(v) => *v,
            CountCell::Missing | CountCell::Invalid => 0,
        }
    }
}

pub fn coerce_count(cell: &CellValue) -> CountCell {
    match cell {
        CellValue::Empty => CountCell::Missing,
        CellValue::Number(n) => count_from_float(*n),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CountCell::Missing
            } else {
                trimmed
                    .parse::<f64>()
                    .map(count_from_float)
                    .unwrap_or(CountCell::Invalid)
            }
        }
        CellValue::Bool(_) => CountCell::Invalid,
    }
}

/// True when any of the given cells of a row holds a positive count.
pub(crate) fn has_counts(
    sheet: &RawSheet,
    row: usize,
    columns: impl IntoIterator<Item = usize>,
) -> bool {
    columns
        .into_iter()
        .any(|col| coerce_count(sheet.cell(row, col)).value() > 0)
}

fn count_from_float(n: f64) -> CountCell {
    if n.is_finite() && n >= 0.0 {
        CountCell::Value(n.trunc() as u64)
    } else {
        CountCell::Invalid
    }
}

/// Rows of one sheet after exclusion and coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSheet {
    pub label: String,
    pub period: Period,
    pub rows: Vec<RegistrationRow>,
    /// Channels that had a column in this sheet.
    pub present_channels: Vec<Channel>,
    /// Channels with no column; they contribute zero.
    pub missing_channels: Vec<Channel>,
    /// Non-numeric cells that were read as zero.
    pub coerced_cells: usize,
    pub excluded_rows: usize,
    /// Rows with counts but no specialty name; they are dropped.
    pub blank_specialty_rows: usize,
}

/// Locates each channel's column: the standard header first, then the
/// configured aliases.
pub fn resolve_channel_columns(sheet: &RawSheet, config: &IngestionConfig) -> Vec<(Channel, usize)> {
    Channel::ALL
        .into_iter()
        .filter_map(|channel| {
            sheet
                .column_index(|h| Channel::from_header(h) == Some(channel))
                .or_else(|| sheet.column_index(|h| config.is_channel_alias(channel, h)))
                .map(|idx| (channel, idx))
        })
        .collect()
}

pub fn normalize_sheet(
    sheet: &RawSheet,
    period: Period,
    config: &IngestionConfig,
) -> Result<NormalizedSheet, SkipReason> {
    let specialty_col = sheet
        .column_index(|h| config.is_specialty_header(h))
        .ok_or(SkipReason::MissingSpecialtyColumn)?;

    if sheet.is_empty() {
        return Err(SkipReason::EmptySheet);
    }

    let channel_cols = resolve_channel_columns(sheet, config);
    let present_channels: Vec<Channel> = channel_cols.iter().map(|(c, _)| *c).collect();
    let missing_channels: Vec<Channel> = Channel::ALL
        .into_iter()
        .filter(|c| !present_channels.contains(c))
        .collect();

    let mut rows = Vec::new();
    let mut coerced_cells = 0;
    let mut excluded_rows = 0;
    let mut blank_specialty_rows = 0;

    for idx in 0..sheet.rows.len() {
        let specialty = sheet.cell(idx, specialty_col).as_text().trim().to_string();
        if specialty.is_empty() {
            if has_counts(sheet, idx, channel_cols.iter().map(|(_, col)| *col)) {
                blank_specialty_rows += 1;
            }
            continue;
        }
        if config.is_excluded_specialty(&specialty) {
            excluded_rows += 1;
            continue;
        }

        let mut counts = ChannelCounts::new();
        for (channel, col) in &channel_cols {
            let cell = coerce_count(sheet.cell(idx, *col));
            if cell == CountCell::Invalid {
                coerced_cells += 1;
            }
            counts.set(*channel, cell.value());
        }

        rows.push(RegistrationRow::new(period, specialty, counts));
    }

    if rows.is_empty() {
        return Err(SkipReason::NoDataAfterExclusion);
    }

    debug!(
        "Sheet '{}' ({}): {} rows kept, {} summary rows excluded, channels present: {:?}",
        sheet.label,
        period,
        rows.len(),
        excluded_rows,
        present_channels
    );

    Ok(NormalizedSheet {
        label: sheet.label.clone(),
        period,
        rows,
        present_channels,
        missing_channels,
        coerced_cells,
        excluded_rows,
        blank_specialty_rows,
    })
}
