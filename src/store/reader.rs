use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};
use crate::table::{Cell, Table};

/// Read every sheet of the workbook into memory.
///
/// The first row of each sheet is taken as the header; headerless columns
/// get their Excel column letter as a name so no data is orphaned.
pub fn load_workbook(path: &Path) -> Result<BTreeMap<String, Table>> {
    if !path.exists() {
        return Err(StoreError::StorageUnavailable {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| StoreError::StorageUnavailable {
            path: path.to_path_buf(),
            reason: format!("failed to open workbook: {e}"),
        })?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets = BTreeMap::new();

    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| StoreError::Read(format!("failed to read sheet '{name}': {e}")))?;
        sheets.insert(name, range_to_table(&range));
    }

    Ok(sheets)
}

fn range_to_table(range: &Range<Data>) -> Table {
    let (row_count, col_count) = range.get_size();

    if row_count == 0 || col_count == 0 {
        return Table::default();
    }

    let mut columns = Vec::with_capacity(col_count);
    for col_idx in 0..col_count {
        let header = match convert_cell(range.get((0, col_idx))) {
            Cell::Text(s) if !s.is_empty() => s,
            Cell::Number(n) => Cell::Number(n).to_text(),
            _ => column_index_to_letter(col_idx as u32),
        };
        columns.push(header);
    }

    let mut rows = Vec::with_capacity(row_count.saturating_sub(1));
    for row_idx in 1..row_count {
        let mut row = Vec::with_capacity(col_count);
        for col_idx in 0..col_count {
            row.push(convert_cell(range.get((row_idx, col_idx))));
        }
        rows.push(row);
    }

    Table { columns, rows }
}

/// Convert a calamine cell to our scalar model.
fn convert_cell(cell: Option<&Data>) -> Cell {
    match cell {
        None => Cell::Empty,
        Some(data) => match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()).normalized(),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::DateTime(format_excel_datetime(dt.as_f64())),
            Data::DateTimeIso(s) => Cell::DateTime(s.clone()),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => {
                log::warn!("error cell read as blank: {e:?}");
                Cell::Empty
            }
        },
    }
}

/// Format an Excel serial datetime (days since 1899-12-30) as ISO 8601.
fn format_excel_datetime(value: f64) -> String {
    let days = value.floor() as i64;
    let time_fraction = value.fract();

    let epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    let date = epoch + chrono::Duration::days(days);

    let total_seconds = (time_fraction * 86400.0).round() as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let time = chrono::NaiveTime::from_hms_opt(hours, minutes, seconds).unwrap_or_default();
    let datetime = chrono::NaiveDateTime::new(date, time);

    datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Convert a 0-based column index to an Excel column letter (A..Z, AA..).
fn column_index_to_letter(index: u32) -> String {
    let mut result = String::new();
    let mut n = index + 1;

    while n > 0 {
        n -= 1;
        let c = (b'A' + (n % 26) as u8) as char;
        result.insert(0, c);
        n /= 26;
    }

    result
}

/// SHA-256 checksum of the file bytes.
pub fn compute_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| StoreError::Read(format!("failed to open file for checksum: {e}")))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| StoreError::Read(format!("failed to read file for checksum: {e}")))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    let result = hasher.finalize();
    Ok(format!("{result:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_to_letter() {
        assert_eq!(column_index_to_letter(0), "A");
        assert_eq!(column_index_to_letter(25), "Z");
        assert_eq!(column_index_to_letter(26), "AA");
        assert_eq!(column_index_to_letter(27), "AB");
        assert_eq!(column_index_to_letter(51), "AZ");
        assert_eq!(column_index_to_letter(52), "BA");
    }

    #[test]
    fn excel_serial_datetimes_format_as_iso() {
        // 2024-01-01 00:00 is serial 45292.
        assert_eq!(format_excel_datetime(45292.0), "2024-01-01T00:00:00");
        assert_eq!(format_excel_datetime(45292.5), "2024-01-01T12:00:00");
    }

    #[test]
    fn missing_file_is_storage_unavailable() {
        let err = load_workbook(Path::new("/nonexistent/bookings.xlsx")).unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable { .. }));
    }
}
