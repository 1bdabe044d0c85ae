//! Record operations over one booking workbook.
//!
//! [`BookingDb`] is the surface UI and API layers call. Every logical
//! operation is a full load-modify-save pass over the file, serialized by
//! an internal mutex so two operations from the same process can never
//! interleave their reads and writes. There is no cross-process lock: two
//! independent processes writing the same file race, and the last writer
//! wins. Use [`crate::watcher`] if external rewrites need to be detected.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::schema::{self, BookingCategory, KEY_COLUMN, META_SHEET};
use crate::store::WorkbookStore;
use crate::table::{reconcile, Cell, Record, RowView, Table};

#[derive(Debug)]
pub struct BookingDb {
    store: WorkbookStore,
    lock: Mutex<()>,
}

impl BookingDb {
    /// Open the workbook at `path`, creating it with header-only sheets
    /// for every registered category if it does not exist. An existing
    /// workbook gets its registered sheets reconciled against the schema
    /// registry; the repaired shape is written back only if it changed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = BookingDb {
            store: WorkbookStore::new(path.as_ref()),
            lock: Mutex::new(()),
        };

        if !db.store.exists() {
            log::info!("creating workbook at {}", path.as_ref().display());
            db.store.save(&empty_workbook())?;
            return Ok(db);
        }

        let loaded = db.store.load()?;
        let merged = merge_registered_sheets(loaded.clone())?;
        if sheets_differ(&loaded, &merged) {
            log::info!("backfilling schema drift in {}", path.as_ref().display());
            db.store.save(&merged)?;
        }
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Overwrite whatever is at `path` with a fresh, empty workbook and
    /// open it. Recovery policy for a corrupted file that [`Self::open`]
    /// refuses, invoked at the caller's discretion.
    pub fn reinitialize(path: impl AsRef<Path>) -> Result<Self> {
        log::warn!("reinitializing workbook at {}", path.as_ref().display());
        let db = BookingDb {
            store: WorkbookStore::new(path.as_ref()),
            lock: Mutex::new(()),
        };
        db.store.save(&empty_workbook())?;
        Ok(db)
    }

    /// SHA-256 of the current file bytes.
    pub fn checksum(&self) -> Result<String> {
        self.store.checksum()
    }

    /// Booking sheet names: registered categories first, then any other
    /// non-metadata sheets the file carries.
    pub fn list_sheets(&self) -> Result<Vec<String>> {
        let _guard = self.guard()?;
        let sheets = self.load_merged()?;
        let mut names: Vec<String> = schema::booking_sheets()
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in sheets.keys() {
            if name != META_SHEET && !names.iter().any(|n| n == name) {
                names.push(name.clone());
            }
        }
        Ok(names)
    }

    /// Read-only snapshot of one sheet.
    pub fn get_sheet(&self, name: &str) -> Result<Table> {
        let _guard = self.guard()?;
        let mut sheets = self.load_merged()?;
        sheets
            .remove(name)
            .ok_or_else(|| StoreError::SheetNotFound(name.to_string()))
    }

    /// Snapshots of every booking sheet.
    pub fn get_all(&self) -> Result<BTreeMap<String, Table>> {
        let _guard = self.guard()?;
        let mut sheets = self.load_merged()?;
        sheets.remove(META_SHEET);
        Ok(sheets)
    }

    /// Timestamp of the last successful save, as "date time", if the
    /// metadata sheet is present and populated.
    pub fn get_last_updated(&self) -> Result<Option<String>> {
        let _guard = self.guard()?;
        let sheets = self.store.load()?;
        let Some(meta) = sheets.get(META_SHEET) else {
            return Ok(None);
        };
        let date = meta.cell(0, schema::META_COLUMNS[0]);
        let time = meta.cell(0, schema::META_COLUMNS[1]);
        let stamp = [date, time]
            .into_iter()
            .flatten()
            .map(Cell::to_text)
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(if stamp.is_empty() { None } else { Some(stamp) })
    }

    /// A booking id not present in the sheet at call time.
    ///
    /// Structured scheme: category prefix, `%y%m%d%H%M%S` timestamp, four
    /// random hex characters. The id is only reserved once a record using
    /// it is appended; [`Self::append`] re-checks before inserting.
    pub fn generate_id(&self, sheet: &str) -> Result<String> {
        let _guard = self.guard()?;
        let sheets = self.load_merged()?;
        let table = sheets
            .get(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        Ok(fresh_id(sheet, &existing_ids(table)))
    }

    /// The first record whose booking id matches `id` (trimmed, exact),
    /// split into declared-schema fields and preserved extra fields.
    /// Unlike update/delete, a miss here is an error: callers asking for
    /// one specific record want [`StoreError::NotFound`], not a flag.
    pub fn get_record(&self, sheet: &str, id: &str) -> Result<RowView> {
        let _guard = self.guard()?;
        let sheets = self.load_merged()?;
        let table = sheets
            .get(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        let key = table
            .column_index(KEY_COLUMN)
            .ok_or_else(|| StoreError::MissingKeyColumn(sheet.to_string()))?;

        let target = id.trim();
        let row_idx = *matching_rows(table, key, target)
            .first()
            .ok_or_else(|| StoreError::NotFound {
                sheet: sheet.to_string(),
                id: target.to_string(),
            })?;

        let declared = schema::required_columns(sheet).unwrap_or_else(|| table.columns.clone());
        table
            .row_view(row_idx, &declared)
            .ok_or_else(|| StoreError::NotFound {
                sheet: sheet.to_string(),
                id: target.to_string(),
            })
    }

    /// Append one record; returns the booking id used. A blank id is
    /// filled from the generator; a supplied id that already exists is
    /// rejected with [`StoreError::DuplicateId`]. Record keys that are not
    /// columns of the sheet are dropped. Never mutates existing rows.
    pub fn append(&self, sheet: &str, record: &Record) -> Result<String> {
        let _guard = self.guard()?;
        let mut sheets = self.load_merged()?;
        let table = sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;

        let mut record = record.clone();
        let mut id = String::new();

        if table.column_index(KEY_COLUMN).is_some() {
            let existing = existing_ids(table);
            let supplied = record
                .get(KEY_COLUMN)
                .map(|c| c.to_text().trim().to_string())
                .unwrap_or_default();

            id = if supplied.is_empty() {
                fresh_id(sheet, &existing)
            } else {
                if existing.contains(&supplied) {
                    return Err(StoreError::DuplicateId {
                        sheet: sheet.to_string(),
                        id: supplied,
                    });
                }
                supplied
            };
            record.insert(KEY_COLUMN.to_string(), Cell::Text(id.clone()));
        }

        table.push_record(&record);
        self.store.save(&sheets)?;
        log::debug!("appended record {id} to sheet '{sheet}'");
        Ok(id)
    }

    /// Apply `changes` to the record whose booking id matches `id`
    /// (trimmed, exact). Returns `Ok(false)` when no row matches. Only
    /// columns already present in the sheet are updated; unknown keys are
    /// ignored. With duplicate ids (a data-quality condition, logged) only
    /// the first match is touched.
    pub fn update(&self, sheet: &str, id: &str, changes: &Record) -> Result<bool> {
        let _guard = self.guard()?;
        let mut sheets = self.load_merged()?;
        let table = sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        let key = table
            .column_index(KEY_COLUMN)
            .ok_or_else(|| StoreError::MissingKeyColumn(sheet.to_string()))?;

        let target = id.trim();
        let matches = matching_rows(table, key, target);
        let Some(&row_idx) = matches.first() else {
            return Ok(false);
        };
        if matches.len() > 1 {
            log::warn!(
                "booking id '{target}' matches {} rows in sheet '{sheet}'; updating the first",
                matches.len()
            );
        }

        if let Some(new_key) = changes.get(KEY_COLUMN) {
            let new_id = new_key.to_text().trim().to_string();
            let collides = table.rows.iter().enumerate().any(|(i, row)| {
                i != row_idx && row.get(key).map(Cell::to_text).as_deref().map(str::trim)
                    == Some(new_id.as_str())
            });
            if collides {
                return Err(StoreError::DuplicateId {
                    sheet: sheet.to_string(),
                    id: new_id,
                });
            }
        }

        for (column, value) in changes {
            if let Some(col_idx) = table.column_index(column) {
                table.rows[row_idx][col_idx] = value.clone().normalized();
            }
        }

        self.store.save(&sheets)?;
        log::debug!("updated record {target} in sheet '{sheet}'");
        Ok(true)
    }

    /// Remove every record whose booking id matches `id` (trimmed,
    /// exact) — delete is "delete all matching", not "delete one".
    /// Returns `Ok(false)` and leaves the file untouched when nothing
    /// matches.
    pub fn delete(&self, sheet: &str, id: &str) -> Result<bool> {
        let _guard = self.guard()?;
        let mut sheets = self.load_merged()?;
        let table = sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        let key = table
            .column_index(KEY_COLUMN)
            .ok_or_else(|| StoreError::MissingKeyColumn(sheet.to_string()))?;

        let target = id.trim();
        let before = table.row_count();
        table.rows.retain(|row| {
            row.get(key).map(Cell::to_text).as_deref().map(str::trim) != Some(target)
        });
        let removed = before - table.row_count();
        if removed == 0 {
            return Ok(false);
        }
        if removed > 1 {
            log::warn!("booking id '{target}' matched {removed} rows in sheet '{sheet}'");
        }

        self.store.save(&sheets)?;
        log::debug!("deleted {removed} record(s) {target} from sheet '{sheet}'");
        Ok(true)
    }

    /// Bulk-replace one sheet's contents, e.g. from an inline editor or a
    /// file upload. The incoming table is reconciled against the sheet's
    /// required columns (registered sheets) or its current columns, and
    /// every other sheet is preserved by load-merge-save.
    pub fn save_sheet(&self, name: &str, table: &Table) -> Result<()> {
        if name == META_SHEET {
            return Err(StoreError::SheetNotFound(name.to_string()));
        }
        let _guard = self.guard()?;
        let mut sheets = self.load_merged()?;

        let reference = match schema::required_columns(name) {
            Some(required) => required,
            None => match sheets.get(name) {
                Some(current) => current.columns.clone(),
                None => table.columns.clone(),
            },
        };

        let reconciled = reconcile(table, &reference)?;
        sheets.insert(name.to_string(), reconciled);
        self.store.save(&sheets)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| StoreError::Lock)
    }

    /// Load the file and graft in any registered sheet it is missing,
    /// with every registered sheet reconciled to its required columns.
    fn load_merged(&self) -> Result<BTreeMap<String, Table>> {
        merge_registered_sheets(self.store.load()?)
    }
}

fn empty_workbook() -> BTreeMap<String, Table> {
    BookingCategory::ALL
        .iter()
        .map(|c| (c.sheet_name().to_string(), Table::new(c.columns())))
        .collect()
}

fn merge_registered_sheets(
    mut sheets: BTreeMap<String, Table>,
) -> Result<BTreeMap<String, Table>> {
    for category in BookingCategory::ALL {
        let name = category.sheet_name();
        let required = category.columns();
        let merged = match sheets.remove(name) {
            Some(table) => reconcile(&table, &required)?,
            None => Table::new(required),
        };
        sheets.insert(name.to_string(), merged);
    }
    Ok(sheets)
}

fn sheets_differ(a: &BTreeMap<String, Table>, b: &BTreeMap<String, Table>) -> bool {
    a.len() != b.len() || a.iter().any(|(name, table)| b.get(name) != Some(table))
}

fn existing_ids(table: &Table) -> BTreeSet<String> {
    let Some(key) = table.column_index(KEY_COLUMN) else {
        return BTreeSet::new();
    };
    table
        .rows
        .iter()
        .filter_map(|row| row.get(key))
        .map(|cell| cell.to_text().trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

fn matching_rows(table: &Table, key: usize, target: &str) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            row.get(key).map(Cell::to_text).as_deref().map(str::trim) == Some(target)
        })
        .map(|(i, _)| i)
        .collect()
}

fn fresh_id(sheet: &str, existing: &BTreeSet<String>) -> String {
    let prefix = schema::id_prefix(sheet);
    loop {
        let stamp = chrono::Local::now().format("%y%m%d%H%M%S");
        let suffix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(4)
            .collect::<String>()
            .to_uppercase();
        let candidate = format!("{prefix}{stamp}{suffix}");
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
}
