//! Workbook store: the physical file boundary.
//!
//! Reads the entire workbook into named [`Table`]s and writes the entire
//! set back in one pass. A save is a full-file replace; callers must
//! load-merge-save so sheets they did not touch survive.

pub mod reader;
pub mod writer;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::table::Table;

pub use reader::{compute_checksum, load_workbook};
pub use writer::save_workbook;

/// Owns the path to one workbook file.
#[derive(Debug, Clone)]
pub struct WorkbookStore {
    path: PathBuf,
}

impl WorkbookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WorkbookStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file is present.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read every sheet present in the file.
    pub fn load(&self) -> Result<BTreeMap<String, Table>> {
        load_workbook(&self.path)
    }

    /// Replace the file with exactly the given sheets (plus the metadata
    /// sheet, stamped with the current time).
    pub fn save(&self, sheets: &BTreeMap<String, Table>) -> Result<()> {
        save_workbook(&self.path, sheets)
    }

    /// SHA-256 of the file bytes, for external-change detection.
    pub fn checksum(&self) -> Result<String> {
        compute_checksum(&self.path)
    }
}
