//! In-memory table model and schema reconciliation.
//!
//! A [`Table`] is one sheet: an ordered column schema plus positional rows.
//! [`reconcile`] aligns a table to a required column list without dropping
//! data, which is how schema drift between the workbook file and the
//! registry is repaired on every load.

pub mod reconcile;
pub mod types;

pub use reconcile::reconcile;
pub use types::{Cell, Record, RowView, Table};
