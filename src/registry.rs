//! Explicit store registry keyed by workbook path.
//!
//! One [`BookingDb`] per backing file, shared by whichever layers need it.
//! This replaces the implicit session-global cache a UI framework would
//! offer: construct one registry at process start and pass it around, and
//! call [`StoreRegistry::invalidate`] when a path should be re-opened.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::db::BookingDb;
use crate::error::{Result, StoreError};

#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<PathBuf, Arc<BookingDb>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store for `path`, opening (and initializing) it on first use.
    /// Paths are canonicalized so different spellings of the same file
    /// share one store and one lock.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Arc<BookingDb>> {
        let key = canonical_key(path.as_ref());

        let mut stores = self.stores.lock().map_err(|_| StoreError::Lock)?;
        if let Some(existing) = stores.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let db = Arc::new(BookingDb::open(path.as_ref())?);
        // Key on the now-existing file so later spellings canonicalize to it.
        let key = canonical_key(path.as_ref());
        stores.insert(key, Arc::clone(&db));
        Ok(db)
    }

    /// Drop the cached store for `path`. Callers holding an `Arc` keep
    /// their handle; the next `open` constructs a fresh store.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        let key = canonical_key(path.as_ref());
        self.stores
            .lock()
            .map(|mut stores| stores.remove(&key).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut stores) = self.stores.lock() {
            stores.clear();
        }
    }
}

fn canonical_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_yields_the_same_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");
        let registry = StoreRegistry::new();

        let a = registry.open(&path).unwrap();
        let b = registry.open(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalidate_forces_a_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");
        let registry = StoreRegistry::new();

        let a = registry.open(&path).unwrap();
        assert!(registry.invalidate(&path));
        assert!(!registry.invalidate(&path));
        let b = registry.open(&path).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
