use crate::error::{Result, StoreError};

use super::types::{Cell, Table};

/// Align a table's columns to a required list without losing data.
///
/// Missing required columns are backfilled with blanks for every existing
/// row. The result's columns start with `required` in the given order; any
/// other columns the table carried follow in their original relative
/// order. Blank cells are normalized to [`Cell::Empty`]. Idempotent.
///
/// Fails with [`StoreError::ShapeMismatch`] when the input cannot be
/// repaired by backfilling: duplicate column names, or rows wider than the
/// header (values that would belong to no column).
pub fn reconcile(table: &Table, required: &[String]) -> Result<Table> {
    check_unique(&table.columns, "table")?;
    check_unique(required, "required list")?;

    for row in &table.rows {
        if row.len() > table.columns.len() {
            return Err(StoreError::ShapeMismatch(format!(
                "row has {} values but the header has {} columns",
                row.len(),
                table.columns.len()
            )));
        }
    }

    let mut columns: Vec<String> = required.to_vec();
    columns.extend(
        table
            .columns
            .iter()
            .filter(|c| !required.contains(c))
            .cloned(),
    );

    let rows = table
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| match table.column_index(column) {
                    Some(i) => row.get(i).cloned().unwrap_or_default().normalized(),
                    None => Cell::Empty,
                })
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}

fn check_unique(columns: &[String], what: &str) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(StoreError::ShapeMismatch(format!(
                "duplicate column '{column}' in {what}"
            )));
        }
    }
    Ok(())
}
