//! Legacy quarter layouts.
//!
//! Older exports come in two shapes: a single wide sheet whose columns are
//! prefixed with the quarter (`Q1_Bàn Khám`, `Q1_Grand Total`, `Q2_PKH`, ...),
//! or one sheet per quarter (`Q3-2023`, `Quý 3`) whose first six columns are
//! read by position as specialty, the four channels in canonical order and
//! the stated grand total. Both are flattened here into ordinary
//! registration rows dated on the first month of their quarter, so nothing
//! downstream ever sees the wide shape.

use crate::config::IngestionConfig;
use crate::normalizer::{coerce_count, has_counts, CountCell, SkipReason};
use crate::schema::{Channel, ChannelCounts, Period, RegistrationRow, RowKey};
use crate::sheet::RawSheet;
use crate::utils::normalize_header;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Column count of a complete positional quarter sheet.
pub const POSITIONAL_COLUMNS: usize = 6;

static QUARTER_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*q([1-4])[\s_\-]+(.+?)\s*$").expect("valid column regex"));

static QUARTER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:quý|quy|q)\s*([1-4])(?:[\s_\-/]*(\d{4}))?\s*$")
        .expect("valid quarter label regex")
});

static YEAR_IN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)((?:19|20)\d{2})(?:\D|$)").expect("valid year regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetLayout {
    /// One sheet per month; the label names the month.
    Monthly,
    /// Quarter-prefixed channel columns in one sheet.
    QuarterWide,
    /// One sheet per quarter, columns read by position.
    QuarterPositional { quarter: u32, year: Option<i32> },
}

pub fn detect_layout(sheet: &RawSheet, config: &IngestionConfig) -> SheetLayout {
    if sheet
        .headers
        .iter()
        .any(|h| parse_quarter_column(h, config).is_some())
    {
        return SheetLayout::QuarterWide;
    }

    if let Some(caps) = QUARTER_LABEL.captures(&sheet.label) {
        let quarter = caps[1].parse().unwrap_or(1);
        let year = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return SheetLayout::QuarterPositional { quarter, year };
    }

    SheetLayout::Monthly
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuarterField {
    Channel(Channel),
    StatedTotal,
}

fn parse_quarter_column(header: &str, config: &IngestionConfig) -> Option<(u32, QuarterField)> {
    let caps = QUARTER_COLUMN.captures(header)?;
    let quarter: u32 = caps[1].parse().ok()?;
    let rest = &caps[2];

    if normalize_header(rest) == "grand total" {
        return Some((quarter, QuarterField::StatedTotal));
    }

    Channel::from_header(rest)
        .or_else(|| {
            Channel::ALL
                .into_iter()
                .find(|c| config.is_channel_alias(*c, rest))
        })
        .map(|channel| (quarter, QuarterField::Channel(channel)))
}

/// Rows flattened out of one legacy sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacySheet {
    pub label: String,
    pub rows: Vec<RegistrationRow>,
    pub coerced_cells: usize,
    pub excluded_rows: usize,
    /// Rows with counts but no specialty name; they are dropped.
    pub blank_specialty_rows: usize,
    /// Column count when a positional sheet had fewer than six columns.
    pub truncated_columns: Option<usize>,
    /// Rows whose stated grand total disagreed with the channel sum.
    pub total_mismatches: Vec<RowKey>,
}

impl LegacySheet {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            rows: Vec::new(),
            coerced_cells: 0,
            excluded_rows: 0,
            blank_specialty_rows: 0,
            truncated_columns: None,
            total_mismatches: Vec::new(),
        }
    }

    fn push_row(&mut self, row: RegistrationRow, stated_total: Option<CountCell>) {
        if let Some(CountCell::Value(stated)) = stated_total {
            if stated != row.grand_total {
                self.total_mismatches.push(row.key());
            }
        }
        self.rows.push(row);
    }

    fn count(&mut self, cell: CountCell) -> u64 {
        if cell == CountCell::Invalid {
            self.coerced_cells += 1;
        }
        cell.value()
    }
}

fn year_from_label(label: &str) -> Option<i32> {
    YEAR_IN_LABEL
        .captures(label)
        .and_then(|caps| caps[1].parse().ok())
}

/// Returns the trimmed specialty for a data row, or `None` when the name is
/// blank or a summary row. Both are tallied on `out`; a blank name only when
/// one of `count_cols` holds a count.
fn row_specialty(
    sheet: &RawSheet,
    row: usize,
    col: usize,
    count_cols: &[usize],
    config: &IngestionConfig,
    out: &mut LegacySheet,
) -> Option<String> {
    let specialty = sheet.cell(row, col).as_text().trim().to_string();
    if specialty.is_empty() {
        if has_counts(sheet, row, count_cols.iter().copied()) {
            out.blank_specialty_rows += 1;
        }
        return None;
    }
    if config.is_excluded_specialty(&specialty) {
        out.excluded_rows += 1;
        return None;
    }
    Some(specialty)
}

pub fn normalize_quarter_wide(
    sheet: &RawSheet,
    config: &IngestionConfig,
) -> Result<LegacySheet, SkipReason> {
    let specialty_col = sheet
        .column_index(|h| config.is_specialty_header(h))
        .ok_or(SkipReason::MissingSpecialtyColumn)?;
    let year = year_from_label(&sheet.label)
        .or(config.legacy_year)
        .ok_or(SkipReason::MissingYear)?;

    if sheet.is_empty() {
        return Err(SkipReason::EmptySheet);
    }

    // quarter -> (channel columns, stated total column)
    let mut layout: [(Vec<(Channel, usize)>, Option<usize>); 4] = Default::default();
    for (idx, header) in sheet.headers.iter().enumerate() {
        match parse_quarter_column(header, config) {
            Some((q, QuarterField::Channel(channel))) => {
                let slot = &mut layout[(q - 1) as usize].0;
                if !slot.iter().any(|(c, _)| *c == channel) {
                    slot.push((channel, idx));
                }
            }
            Some((q, QuarterField::StatedTotal)) => {
                layout[(q - 1) as usize].1.get_or_insert(idx);
            }
            None => {}
        }
    }

    let count_cols: Vec<usize> = layout
        .iter()
        .flat_map(|(channel_cols, total_col)| {
            channel_cols.iter().map(|(_, col)| *col).chain(*total_col)
        })
        .collect();
    let mut out = LegacySheet::new(&sheet.label);

    for row in 0..sheet.rows.len() {
        let Some(specialty) = row_specialty(sheet, row, specialty_col, &count_cols, config, &mut out)
        else {
            continue;
        };

        for (q_idx, (channel_cols, total_col)) in layout.iter().enumerate() {
            if channel_cols.is_empty() && total_col.is_none() {
                continue;
            }
            let Some(period) = Period::quarter_start(year, q_idx as u32 + 1) else {
                continue;
            };

            let mut counts = ChannelCounts::new();
            for (channel, col) in channel_cols {
                let value = out.count(coerce_count(sheet.cell(row, *col)));
                counts.set(*channel, value);
            }
            let stated = total_col.map(|col| coerce_count(sheet.cell(row, col)));

            out.push_row(RegistrationRow::new(period, specialty.clone(), counts), stated);
        }
    }

    if out.rows.is_empty() {
        return Err(SkipReason::NoDataAfterExclusion);
    }

    debug!(
        "Quarter-wide sheet '{}' ({}): {} quarter rows",
        sheet.label,
        year,
        out.rows.len()
    );

    Ok(out)
}

pub fn normalize_quarter_positional(
    sheet: &RawSheet,
    quarter: u32,
    year: Option<i32>,
    config: &IngestionConfig,
) -> Result<LegacySheet, SkipReason> {
    let year = year
        .or_else(|| year_from_label(&sheet.label))
        .or(config.legacy_year)
        .ok_or(SkipReason::MissingYear)?;
    let period = Period::quarter_start(year, quarter).ok_or(SkipReason::MissingYear)?;

    let columns = sheet.headers.len();
    if columns == 0 {
        return Err(SkipReason::MissingSpecialtyColumn);
    }
    if sheet.is_empty() {
        return Err(SkipReason::EmptySheet);
    }

    let mut out = LegacySheet::new(&sheet.label);
    if columns < POSITIONAL_COLUMNS {
        out.truncated_columns = Some(columns);
    }

    // Slots 1..=4 are the channels in canonical order; slot 5 the stated total.
    let channel_cols: Vec<(Channel, usize)> = Channel::ALL
        .into_iter()
        .enumerate()
        .map(|(i, channel)| (channel, i + 1))
        .filter(|(_, col)| *col < columns)
        .collect();
    let total_col = (POSITIONAL_COLUMNS - 1 < columns).then_some(POSITIONAL_COLUMNS - 1);
    let count_cols: Vec<usize> = (1..columns.min(POSITIONAL_COLUMNS)).collect();

    for row in 0..sheet.rows.len() {
        let Some(specialty) = row_specialty(sheet, row, 0, &count_cols, config, &mut out) else {
            continue;
        };

        let mut counts = ChannelCounts::new();
        for (channel, col) in &channel_cols {
            let value = out.count(coerce_count(sheet.cell(row, *col)));
            counts.set(*channel, value);
        }
        let stated = total_col.map(|col| coerce_count(sheet.cell(row, col)));

        out.push_row(RegistrationRow::new(period, specialty, counts), stated);
    }

    if out.rows.is_empty() {
        return Err(SkipReason::NoDataAfterExclusion);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

    #[test]
    fn test_detect_layout() {
        let config = IngestionConfig::default();

        let monthly = RawSheet::from_grid("Jan-24", &["Chuyên khoa", "PKH"], vec![]);
        assert_eq!(detect_layout(&monthly, &config), SheetLayout::Monthly);

        let wide = RawSheet::from_grid(
            "Data 2023",
            &["Chuyên khoa", "Q1_Bàn Khám", "Q1_Grand Total"],
            vec![],
        );
        assert_eq!(detect_layout(&wide, &config), SheetLayout::QuarterWide);

        let positional = RawSheet::from_grid("Quý 3 - 2023", &["a", "b"], vec![]);
        assert_eq!(
            detect_layout(&positional, &config),
            SheetLayout::QuarterPositional {
                quarter: 3,
                year: Some(2023)
            }
        );

        let bare = RawSheet::from_grid("Q2", &["a"], vec![]);
        assert_eq!(
            detect_layout(&bare, &config),
            SheetLayout::QuarterPositional {
                quarter: 2,
                year: None
            }
        );
    }

    #[test]
    fn test_quarter_wide_flattens_to_quarter_periods() {
        let sheet = RawSheet::from_grid(
            "UMC 2023",
            &[
                "Chuyên khoa",
                "Q1_Bàn Khám",
                "Q1_PKH",
                "Q1_Grand Total",
                "Q2_Bàn Khám",
                "Q2_Grand Total",
            ],
            vec![
                vec![
                    "Nhi".into(),
                    10.0.into(),
                    5.0.into(),
                    15.0.into(),
                    7.0.into(),
                    9.0.into(),
                ],
                vec![
                    "Grand Total".into(),
                    10.0.into(),
                    5.0.into(),
                    15.0.into(),
                    7.0.into(),
                    7.0.into(),
                ],
            ],
        );

        let out = normalize_quarter_wide(&sheet, &IngestionConfig::default()).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.excluded_rows, 1);

        let q1 = &out.rows[0];
        assert_eq!(q1.period, Period::new(2023, 1).unwrap());
        assert_eq!(q1.grand_total, 15);

        let q2 = &out.rows[1];
        assert_eq!(q2.period, Period::new(2023, 4).unwrap());
        assert_eq!(q2.count(Channel::BanKham), 7);
        assert_eq!(q2.grand_total, 7);
        assert_eq!(out.total_mismatches, vec![q2.key()]);
    }

    #[test]
    fn test_quarter_wide_needs_year() {
        let sheet = RawSheet::from_grid(
            "Data",
            &["Chuyên khoa", "Q1_PKH"],
            vec![vec!["Nhi".into(), 1.0.into()]],
        );
        assert_eq!(
            normalize_quarter_wide(&sheet, &IngestionConfig::default()),
            Err(SkipReason::MissingYear)
        );

        let config = IngestionConfig {
            legacy_year: Some(2022),
            ..IngestionConfig::default()
        };
        let out = normalize_quarter_wide(&sheet, &config).unwrap();
        assert_eq!(out.rows[0].period, Period::new(2022, 1).unwrap());
    }

    #[test]
    fn test_positional_reads_columns_by_position() {
        let sheet = RawSheet::from_grid(
            "Q4-2023",
            &["Khoa", "A", "B", "C", "D", "Tổng"],
            vec![vec![
                "Da liễu".into(),
                1.0.into(),
                2.0.into(),
                3.0.into(),
                4.0.into(),
                10.0.into(),
            ]],
        );

        let out = normalize_quarter_positional(&sheet, 4, Some(2023), &IngestionConfig::default())
            .unwrap();
        let row = &out.rows[0];
        assert_eq!(row.period, Period::new(2023, 10).unwrap());
        assert_eq!(row.count(Channel::BanKham), 1);
        assert_eq!(row.count(Channel::UmcCare), 4);
        assert_eq!(row.grand_total, 10);
        assert!(out.truncated_columns.is_none());
        assert!(out.total_mismatches.is_empty());
    }

    #[test]
    fn test_positional_short_sheet_is_partial_fill() {
        let sheet = RawSheet::from_grid(
            "Q1-2024",
            &["Khoa", "A", "B"],
            vec![vec!["Nhi".into(), 1.0.into(), CellValue::text("x")]],
        );

        let out = normalize_quarter_positional(&sheet, 1, Some(2024), &IngestionConfig::default())
            .unwrap();
        assert_eq!(out.truncated_columns, Some(3));
        assert_eq!(out.coerced_cells, 1);
        let row = &out.rows[0];
        assert!(row.channels.is_present(Channel::Pkh));
        assert!(!row.channels.is_present(Channel::TongDai));
        assert_eq!(row.grand_total, 1);
    }

    #[test]
    fn test_blank_specialty_rows_are_tallied() {
        let wide = RawSheet::from_grid(
            "Data 2023",
            &["Chuyên khoa", "Q1_PKH", "Ghi chú"],
            vec![
                vec!["Nhi".into(), 2.0.into(), CellValue::Empty],
                vec![CellValue::Empty, 30.0.into(), CellValue::Empty],
                vec![CellValue::Empty, CellValue::Empty, 9.0.into()],
            ],
        );
        let out = normalize_quarter_wide(&wide, &IngestionConfig::default()).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.blank_specialty_rows, 1);

        let positional = RawSheet::from_grid(
            "Q3-2023",
            &["Khoa", "A", "B", "C", "D", "Tổng"],
            vec![
                vec!["Mắt".into(), 1.0.into(), 0.0.into(), 0.0.into(), 0.0.into(), 1.0.into()],
                vec!["".into(), 0.0.into(), 0.0.into(), 5.0.into(), 0.0.into(), 5.0.into()],
            ],
        );
        let out =
            normalize_quarter_positional(&positional, 3, Some(2023), &IngestionConfig::default())
                .unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.blank_specialty_rows, 1);
    }
}
