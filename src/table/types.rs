use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single scalar cell value.
///
/// `Empty` and an empty string are the same "no value" and compare equal;
/// that is the canonical blank for this store (never NaN, never a missing
/// key).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// ISO 8601 string.
    DateTime(String),
}

impl Cell {
    /// Whether this cell carries no value.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// String rendering used for key comparison and display.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Cell::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Cell::DateTime(s) => s.clone(),
        }
    }

    /// Numeric view of the cell, parsing text if needed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Normalize blanks to `Empty`.
    pub fn normalized(self) -> Cell {
        if self.is_blank() {
            Cell::Empty
        } else {
            self
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Number(a), Cell::Number(b)) => a == b,
            (Cell::Bool(a), Cell::Bool(b)) => a == b,
            (Cell::DateTime(a), Cell::DateTime(b)) => a == b,
            (a, b) => a.is_blank() && b.is_blank(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string()).normalized()
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value).normalized()
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

/// A caller-supplied record: column name to value.
pub type Record = BTreeMap<String, Cell>;

/// One row projected against a declared column list. Columns of the
/// declared schema land in `fields`; anything else the row carries is
/// preserved verbatim in `extra`, never folded into the declared set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowView {
    pub fields: BTreeMap<String, Cell>,
    pub extra: BTreeMap<String, Cell>,
}

/// An in-memory sheet: an ordered column schema plus positional rows.
///
/// Rows are kept padded to the column count. Lookup by key is a linear
/// scan; the persistence layer rewrites the whole file per save anyway, so
/// a secondary index would buy nothing at these sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Header-only table with zero rows.
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (row, column name), if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    /// Append a record, ordered by this table's columns. Record keys that
    /// are not columns of the table are dropped.
    pub fn push_record(&mut self, record: &Record) {
        let row = self
            .columns
            .iter()
            .map(|column| record.get(column).cloned().unwrap_or_default().normalized())
            .collect();
        self.rows.push(row);
    }

    /// Project one row against a declared column list, splitting declared
    /// fields from preserved extras.
    pub fn row_view(&self, row: usize, declared: &[String]) -> Option<RowView> {
        let cells = self.rows.get(row)?;
        let mut fields = BTreeMap::new();
        let mut extra = BTreeMap::new();
        for (i, column) in self.columns.iter().enumerate() {
            let value = cells.get(i).cloned().unwrap_or_default();
            if declared.contains(column) {
                fields.insert(column.clone(), value);
            } else {
                extra.insert(column.clone(), value);
            }
        }
        Some(RowView { fields, extra })
    }

    /// All rows as records (column name to value).
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|cells| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| {
                        (column.clone(), cells.get(i).cloned().unwrap_or_default())
                    })
                    .collect()
            })
            .collect()
    }
}
