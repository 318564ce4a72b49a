use crate::error::{RegistrationError, Result};
use crate::sheet::{CellValue, RawSheet};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use log::{debug, info};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// Reads every sheet of an uploaded workbook (xlsx, xls, xlsb or ods) from
/// its bytes, in workbook order.
pub fn read_workbook_bytes(bytes: &[u8]) -> Result<Vec<RawSheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| RegistrationError::Workbook(e.to_string()))?;
    collect_sheets(&mut workbook)
}

pub fn read_workbook_path(path: impl AsRef<Path>) -> Result<Vec<RawSheet>> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| RegistrationError::Workbook(format!("{}: {}", path.display(), e)))?;
    collect_sheets(&mut workbook)
}

fn collect_sheets<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> Result<Vec<RawSheet>> {
    let names = workbook.sheet_names();
    if names.is_empty() {
        return Err(RegistrationError::EmptyWorkbook);
    }
    info!("Reading workbook with {} sheet(s)", names.len());

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| RegistrationError::Workbook(format!("sheet '{}': {}", name, e)))?;
        let sheet = range_to_sheet(&name, &range);
        debug!(
            "Sheet '{}': {} header(s), {} data row(s)",
            name,
            sheet.headers.len(),
            sheet.rows.len()
        );
        sheets.push(sheet);
    }

    Ok(sheets)
}

/// The first row with any content is the header; everything below is data.
fn range_to_sheet(name: &str, range: &Range<Data>) -> RawSheet {
    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));

    let headers = rows
        .next()
        .map(|row| {
            row.iter()
                .map(|c| cell_value(c).as_text().trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let data = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    RawSheet::new(name, headers, data)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Text(dt.to_string()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_bytes_are_a_workbook_error() {
        let err = read_workbook_bytes(b"definitely not a spreadsheet").unwrap_err();
        assert!(matches!(err, RegistrationError::Workbook(_)));
        assert!(err.to_string().starts_with("Could not read the workbook"));
    }

    #[test]
    fn test_range_header_is_first_non_empty_row() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 1));
        range.set_value((1, 0), Data::String("Chuyên khoa".to_string()));
        range.set_value((1, 1), Data::String("PKH".to_string()));
        range.set_value((2, 0), Data::String("Nhi".to_string()));
        range.set_value((2, 1), Data::Int(4));

        let sheet = range_to_sheet("Jan-24", &range);
        assert_eq!(sheet.headers, vec!["Chuyên khoa", "PKH"]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][1], CellValue::Number(4.0));
    }
}
