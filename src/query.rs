//! Linear-scan queries over a loaded table.
//!
//! These operate on the private snapshot a caller got from the store; they
//! never touch the file. A filter or search against a column the table
//! does not have returns an empty result rather than an error, since
//! callers routinely probe optional columns.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::table::{Cell, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    IsEmpty,
    NotEmpty,
}

/// Rows of `table` whose `column` matches the condition. String
/// comparisons are case-insensitive.
pub fn filter(table: &Table, column: &str, op: FilterOp, value: &str) -> Table {
    let Some(col_idx) = table.column_index(column) else {
        log::debug!("filter on unknown column '{column}'");
        return Table::new(table.columns.clone());
    };

    let rows = table
        .rows
        .iter()
        .filter(|row| {
            let cell = row.get(col_idx).cloned().unwrap_or_default();
            matches_op(&cell, op, value)
        })
        .cloned()
        .collect();

    Table {
        columns: table.columns.clone(),
        rows,
    }
}

fn matches_op(cell: &Cell, op: FilterOp, value: &str) -> bool {
    let text = cell.to_text();
    match op {
        FilterOp::Equals => text.eq_ignore_ascii_case(value),
        FilterOp::NotEquals => !text.eq_ignore_ascii_case(value),
        FilterOp::Contains => text.to_lowercase().contains(&value.to_lowercase()),
        FilterOp::NotContains => !text.to_lowercase().contains(&value.to_lowercase()),
        FilterOp::GreaterThan => compare_numeric(cell, value, |a, b| a > b),
        FilterOp::LessThan => compare_numeric(cell, value, |a, b| a < b),
        FilterOp::GreaterEqual => compare_numeric(cell, value, |a, b| a >= b),
        FilterOp::LessEqual => compare_numeric(cell, value, |a, b| a <= b),
        FilterOp::IsEmpty => cell.is_blank() || text.trim().is_empty(),
        FilterOp::NotEmpty => !cell.is_blank() && !text.trim().is_empty(),
    }
}

fn compare_numeric(cell: &Cell, value: &str, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (cell.as_number(), value.trim().parse::<f64>()) {
        (Some(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

/// Rows containing `query` in any of the given columns (all columns when
/// `columns` is `None`). Case-insensitive; `exact` requires a whole-cell
/// match instead of a substring.
pub fn search(table: &Table, query: &str, columns: Option<&[String]>, exact: bool) -> Table {
    let search_cols: Vec<usize> = match columns {
        Some(names) => names
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect(),
        None => (0..table.columns.len()).collect(),
    };

    let query_lower = query.to_lowercase();
    let rows = table
        .rows
        .iter()
        .filter(|row| {
            search_cols.iter().any(|&col_idx| {
                let text = row
                    .get(col_idx)
                    .map(Cell::to_text)
                    .unwrap_or_default()
                    .to_lowercase();
                if exact {
                    text == query_lower
                } else {
                    text.contains(&query_lower)
                }
            })
        })
        .cloned()
        .collect();

    Table {
        columns: table.columns.clone(),
        rows,
    }
}

/// Rows whose `date_column` parses as a date within `[start, end]`
/// (inclusive). Unparseable cells never match.
pub fn filter_by_date_range(
    table: &Table,
    date_column: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Table {
    let Some(col_idx) = table.column_index(date_column) else {
        return Table::new(table.columns.clone());
    };

    let rows = table
        .rows
        .iter()
        .filter(|row| {
            row.get(col_idx)
                .and_then(parse_date)
                .map(|d| d >= start && d <= end)
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    Table {
        columns: table.columns.clone(),
        rows,
    }
}

fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    let text = cell.to_text();
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    // ISO datetimes, as stored for Excel date cells.
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .ok()
}

/// Headline numbers for one booking sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetStatistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Sum of the "Total Amount" column, when the sheet has one.
    pub total_amount: Option<f64>,
}

pub fn statistics(table: &Table) -> SheetStatistics {
    let mut by_status = BTreeMap::new();
    if let Some(status_idx) = table.column_index("Status") {
        for row in &table.rows {
            let status = row
                .get(status_idx)
                .map(Cell::to_text)
                .unwrap_or_default()
                .trim()
                .to_string();
            if !status.is_empty() {
                *by_status.entry(status).or_insert(0) += 1;
            }
        }
    }

    let total_amount = table.column_index("Total Amount").map(|amount_idx| {
        table
            .rows
            .iter()
            .filter_map(|row| row.get(amount_idx).and_then(Cell::as_number))
            .sum::<f64>()
    });

    SheetStatistics {
        total: table.row_count(),
        by_status,
        total_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec![
            "Booking ID".to_string(),
            "Client Name".to_string(),
            "Status".to_string(),
            "Total Amount".to_string(),
            "Travel Start Date".to_string(),
        ]);
        table.rows.push(vec![
            Cell::from("FL1"),
            Cell::from("Asha Rao"),
            Cell::from("Confirmed"),
            Cell::Number(1200.0),
            Cell::from("2026-01-10"),
        ]);
        table.rows.push(vec![
            Cell::from("FL2"),
            Cell::from("Ben Ode"),
            Cell::from("Cancelled"),
            Cell::Number(800.0),
            Cell::from("2026-02-20"),
        ]);
        table.rows.push(vec![
            Cell::from("FL3"),
            Cell::from("asha k"),
            Cell::from("Confirmed"),
            Cell::Empty,
            Cell::Empty,
        ]);
        table
    }

    #[test]
    fn filter_equals_is_case_insensitive() {
        let out = filter(&sample(), "Status", FilterOp::Equals, "confirmed");
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn filter_numeric_comparison_skips_non_numbers() {
        let out = filter(&sample(), "Total Amount", FilterOp::GreaterThan, "1000");
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.cell(0, "Booking ID"), Some(&Cell::from("FL1")));
    }

    #[test]
    fn filter_unknown_column_returns_empty_table() {
        let out = filter(&sample(), "Nope", FilterOp::Equals, "x");
        assert!(out.is_empty());
        assert_eq!(out.columns, sample().columns);
    }

    #[test]
    fn filter_is_empty_treats_blank_text_as_empty() {
        let out = filter(&sample(), "Total Amount", FilterOp::IsEmpty, "");
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn search_spans_all_columns_unless_restricted() {
        let out = search(&sample(), "asha", None, false);
        assert_eq!(out.row_count(), 2);

        let only_status = vec!["Status".to_string()];
        let out = search(&sample(), "asha", Some(&only_status), false);
        assert!(out.is_empty());
    }

    #[test]
    fn exact_search_requires_whole_cell_match() {
        let out = search(&sample(), "asha", None, true);
        assert!(out.is_empty());
        let out = search(&sample(), "asha k", None, true);
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn date_range_is_inclusive_and_skips_unparseable() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let out = filter_by_date_range(&sample(), "Travel Start Date", start, end);
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.cell(0, "Booking ID"), Some(&Cell::from("FL1")));
    }

    #[test]
    fn statistics_count_statuses_and_sum_amounts() {
        let stats = statistics(&sample());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status.get("Confirmed"), Some(&2));
        assert_eq!(stats.by_status.get("Cancelled"), Some(&1));
        assert_eq!(stats.total_amount, Some(2000.0));
    }
}
