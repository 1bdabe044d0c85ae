use std::collections::BTreeMap;
use std::path::Path;

use umya_spreadsheet::{new_file, writer, Spreadsheet, Worksheet};

use crate::error::{Result, StoreError};
use crate::schema::{META_COLUMNS, META_SHEET};
use crate::table::{Cell, Table};

/// Replace the entire workbook file with exactly the given sheets plus a
/// freshly stamped metadata sheet.
///
/// The workbook is serialized to a sibling temp file and renamed over the
/// target, so an interrupted save never leaves a truncated file behind.
pub fn save_workbook(path: &Path, sheets: &BTreeMap<String, Table>) -> Result<()> {
    let mut book = new_file();
    // new_file() seeds a default sheet we do not want.
    let _ = book.remove_sheet_by_name("Sheet1");

    for (name, table) in sheets {
        if name == META_SHEET {
            continue;
        }
        write_sheet(&mut book, name, table)?;
    }
    write_meta_sheet(&mut book)?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let tmp = tempfile::Builder::new()
        .prefix(".bookingdb-")
        .suffix(".xlsx")
        .tempfile_in(dir.unwrap_or_else(|| Path::new(".")))
        .map_err(|e| StoreError::Write(format!("failed to create temp file: {e}")))?;
    let tmp_path = tmp.into_temp_path();

    writer::xlsx::write(&book, &tmp_path)
        .map_err(|e| StoreError::Write(format!("failed to write workbook: {e}")))?;

    tmp_path
        .persist(path)
        .map_err(|e| StoreError::Write(format!("failed to replace workbook: {e}")))?;

    log::debug!("saved workbook {} ({} sheets)", path.display(), sheets.len());
    Ok(())
}

fn write_sheet(book: &mut Spreadsheet, name: &str, table: &Table) -> Result<()> {
    let _ = book.new_sheet(name);
    let sheet = book
        .get_sheet_by_name_mut(name)
        .ok_or_else(|| StoreError::Write(format!("failed to create sheet '{name}'")))?;

    for (col_idx, column) in table.columns.iter().enumerate() {
        sheet
            .get_cell_mut(((col_idx + 1) as u32, 1))
            .set_value_string(column);
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = (row_idx + 2) as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            write_cell(sheet, (col_idx + 1) as u32, row_num, cell);
        }
    }

    Ok(())
}

fn write_cell(sheet: &mut Worksheet, col: u32, row: u32, cell: &Cell) {
    match cell {
        Cell::Empty => {}
        // set_value auto-types numeric-looking strings, which would strip
        // the leading zeros off ids and phone numbers. Text stays text.
        Cell::Text(s) => {
            sheet.get_cell_mut((col, row)).set_value_string(s);
        }
        Cell::Number(n) => {
            sheet.get_cell_mut((col, row)).set_value_number(*n);
        }
        Cell::Bool(b) => {
            sheet.get_cell_mut((col, row)).set_value_bool(*b);
        }
        Cell::DateTime(dt) => {
            sheet.get_cell_mut((col, row)).set_value_string(dt);
        }
    }
}

/// Stamp the metadata sheet with the current wall-clock time.
fn write_meta_sheet(book: &mut Spreadsheet) -> Result<()> {
    let _ = book.new_sheet(META_SHEET);
    let sheet = book
        .get_sheet_by_name_mut(META_SHEET)
        .ok_or_else(|| StoreError::Write("failed to create metadata sheet".to_string()))?;

    let now = chrono::Local::now();

    sheet.get_cell_mut("A1").set_value_string(META_COLUMNS[0]);
    sheet.get_cell_mut("B1").set_value_string(META_COLUMNS[1]);
    sheet
        .get_cell_mut("A2")
        .set_value_string(now.format("%Y-%m-%d").to_string());
    sheet
        .get_cell_mut("B2")
        .set_value_string(now.format("%H:%M:%S").to_string());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::reader::load_workbook;

    #[test]
    fn saved_workbook_reads_back_with_meta_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");

        let mut table = Table::new(vec!["Booking ID".to_string(), "Client Name".to_string()]);
        table
            .rows
            .push(vec![Cell::from("FL0001"), Cell::from("Asha")]);

        let mut sheets = BTreeMap::new();
        sheets.insert("Flight".to_string(), table.clone());
        save_workbook(&path, &sheets).unwrap();

        let loaded = load_workbook(&path).unwrap();
        assert_eq!(loaded.get("Flight"), Some(&table));

        let meta = loaded.get(META_SHEET).expect("meta sheet written");
        assert_eq!(meta.columns, META_COLUMNS);
        assert_eq!(meta.row_count(), 1);
    }

    #[test]
    fn numeric_looking_text_stays_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");

        let mut table = Table::new(vec![
            "Booking ID".to_string(),
            "Client Contact".to_string(),
        ]);
        table
            .rows
            .push(vec![Cell::from("007"), Cell::from("0123456789")]);

        let mut sheets = BTreeMap::new();
        sheets.insert("Hotel".to_string(), table);
        save_workbook(&path, &sheets).unwrap();

        let loaded = load_workbook(&path).unwrap();
        let hotel = &loaded["Hotel"];
        assert_eq!(hotel.cell(0, "Booking ID"), Some(&Cell::from("007")));
        assert_eq!(
            hotel.cell(0, "Client Contact"),
            Some(&Cell::from("0123456789"))
        );
    }

    #[test]
    fn bools_and_numbers_round_trip_typed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");

        let mut table = Table::new(vec!["Paid".to_string(), "Nights".to_string()]);
        table.rows.push(vec![Cell::Bool(true), Cell::Number(3.0)]);

        let mut sheets = BTreeMap::new();
        sheets.insert("Hotel".to_string(), table.clone());
        save_workbook(&path, &sheets).unwrap();

        let loaded = load_workbook(&path).unwrap();
        assert_eq!(loaded.get("Hotel"), Some(&table));
    }

    #[test]
    fn save_replaces_previous_contents_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");

        let mut sheets = BTreeMap::new();
        sheets.insert("Flight".to_string(), Table::new(vec!["a".to_string()]));
        sheets.insert("Hotel".to_string(), Table::new(vec!["a".to_string()]));
        save_workbook(&path, &sheets).unwrap();

        sheets.remove("Hotel");
        save_workbook(&path, &sheets).unwrap();

        let loaded = load_workbook(&path).unwrap();
        assert!(loaded.contains_key("Flight"));
        assert!(!loaded.contains_key("Hotel"));
    }
}
