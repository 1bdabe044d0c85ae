//! Spreadsheet-backed record store for travel bookings.
//!
//! One workbook file holds one sheet per booking category (Flight, Hotel,
//! Train, Bus) plus a metadata sheet recording the last save time. This
//! crate provides:
//! - Whole-workbook load and crash-safe whole-workbook save
//! - Schema reconciliation against a static column registry
//! - Keyed append/update/delete with centrally enforced booking ids
//! - Filter, search, and statistics over loaded sheets
//! - External-change detection for the backing file
//!
//! Operations are synchronous and serialized per store within a process.
//! There is no cross-process lock: concurrent external writers race and
//! the last writer wins.

pub mod db;
pub mod error;
pub mod query;
pub mod registry;
pub mod schema;
pub mod store;
pub mod table;
pub mod watcher;

pub use db::BookingDb;
pub use error::{Result, StoreError};
pub use query::{filter, filter_by_date_range, search, statistics, FilterOp, SheetStatistics};
pub use registry::StoreRegistry;
pub use schema::BookingCategory;
pub use store::WorkbookStore;
pub use table::{reconcile, Cell, Record, RowView, Table};
pub use watcher::{create_event_channel, ChangeEvent, ChangeKind, WorkbookWatcher};
