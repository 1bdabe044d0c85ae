//! External-change detection for workbook files.
//!
//! The store offers no cross-process lock, so another process rewriting
//! the same workbook silently wins. [`WorkbookWatcher`] gives callers
//! detection: it watches the file, lets the editor-style save bursts
//! spreadsheet applications produce settle, and emits an event only when
//! the file checksum actually changed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::store::compute_checksum;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    /// Checksum after the change, when the file still exists.
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Modified,
    Deleted,
}

/// How long a file must stay quiet before a burst of raw notifications
/// is reduced to one change check.
const SETTLE: Duration = Duration::from_millis(500);

/// Watches workbook files and reports external modifications.
///
/// Each watched path gets its own event pump thread. Dropping the
/// underlying watcher on [`WorkbookWatcher::unwatch`] disconnects that
/// thread's channel, which is what ends it.
pub struct WorkbookWatcher {
    watchers: Mutex<HashMap<PathBuf, RecommendedWatcher>>,
    event_sender: Sender<ChangeEvent>,
}

/// Per-file state shared between [`WorkbookWatcher`] and the pump thread.
struct WatchedFile {
    path: PathBuf,
    last_checksum: Mutex<String>,
}

impl WorkbookWatcher {
    pub fn new(event_sender: Sender<ChangeEvent>) -> Self {
        WorkbookWatcher {
            watchers: Mutex::new(HashMap::new()),
            event_sender,
        }
    }

    /// Start watching a workbook file. Watching an already watched path is
    /// a no-op.
    pub fn watch(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(StoreError::StorageUnavailable {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let mut watchers = self.watchers.lock().map_err(|_| StoreError::Lock)?;
        if watchers.contains_key(path) {
            return Ok(());
        }

        let state = Arc::new(WatchedFile {
            path: path.to_path_buf(),
            last_checksum: Mutex::new(compute_checksum(path)?),
        });

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| StoreError::Watch(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| StoreError::Watch(format!("failed to watch file: {e}")))?;

        let event_sender = self.event_sender.clone();
        thread::spawn(move || {
            pump_events(rx, state, event_sender);
        });

        watchers.insert(path.to_path_buf(), watcher);
        Ok(())
    }

    pub fn unwatch(&self, path: &Path) -> Result<()> {
        let mut watchers = self.watchers.lock().map_err(|_| StoreError::Lock)?;
        watchers.remove(path);
        Ok(())
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watchers
            .lock()
            .map(|w| w.contains_key(path))
            .unwrap_or(false)
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watchers
            .lock()
            .map(|w| w.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Create the channel a watcher reports through.
pub fn create_event_channel() -> (Sender<ChangeEvent>, Receiver<ChangeEvent>) {
    channel()
}

/// Reduce raw notifications to settled change events.
///
/// Any relevant notification arms a quiet timer; each further one rearms
/// it. The change check runs only once the file has been quiet for
/// [`SETTLE`], so the last write of a burst is always the one examined.
fn pump_events(
    rx: Receiver<std::result::Result<Event, notify::Error>>,
    state: Arc<WatchedFile>,
    event_sender: Sender<ChangeEvent>,
) {
    let mut armed = false;

    loop {
        let received = if armed {
            match rx.recv_timeout(SETTLE) {
                Ok(res) => res,
                Err(RecvTimeoutError::Timeout) => {
                    armed = false;
                    if let Some(change) = state.settle() {
                        let _ = event_sender.send(change);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            // Nothing pending: block until the watcher reports or is
            // dropped by unwatch.
            match rx.recv() {
                Ok(res) => res,
                Err(_) => break,
            }
        };

        match received {
            Ok(event) => {
                if is_relevant(&event.kind) {
                    armed = true;
                }
            }
            Err(e) => {
                log::warn!("watch error for {}: {e}", state.path.display());
            }
        }
    }
}

/// Atomic saves replace the file, which surfaces as remove plus create,
/// so all three kinds arm the settle timer.
fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

impl WatchedFile {
    /// Decide what actually happened once the burst is over, from the
    /// file itself rather than the notification kinds: a missing file is
    /// a deletion, same checksum is a non-change, anything else is a
    /// modification.
    fn settle(&self) -> Option<ChangeEvent> {
        if !self.path.exists() {
            return Some(ChangeEvent {
                path: self.path.clone(),
                kind: ChangeKind::Deleted,
                checksum: None,
            });
        }

        let checksum = match compute_checksum(&self.path) {
            Ok(checksum) => checksum,
            Err(e) => {
                log::warn!("checksum failed for {}: {e}", self.path.display());
                return Some(ChangeEvent {
                    path: self.path.clone(),
                    kind: ChangeKind::Modified,
                    checksum: None,
                });
            }
        };

        let mut last = self.last_checksum.lock().ok()?;
        if *last == checksum {
            return None;
        }
        *last = checksum.clone();

        Some(ChangeEvent {
            path: self.path.clone(),
            kind: ChangeKind::Modified,
            checksum: Some(checksum),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_tracks_and_unwatch_forgets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");
        std::fs::write(&path, b"stub").unwrap();

        let (tx, _rx) = create_event_channel();
        let watcher = WorkbookWatcher::new(tx);

        watcher.watch(&path).unwrap();
        assert!(watcher.is_watching(&path));
        assert_eq!(watcher.watched_paths(), vec![path.clone()]);

        watcher.unwatch(&path).unwrap();
        assert!(!watcher.is_watching(&path));
    }

    #[test]
    fn watching_a_missing_file_fails() {
        let (tx, _rx) = create_event_channel();
        let watcher = WorkbookWatcher::new(tx);
        let err = watcher.watch(Path::new("/nonexistent/bookings.xlsx")).unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable { .. }));
    }

    #[test]
    fn settle_emits_only_when_the_checksum_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");
        std::fs::write(&path, b"v1").unwrap();

        let state = WatchedFile {
            path: path.clone(),
            last_checksum: Mutex::new(compute_checksum(&path).unwrap()),
        };

        // A burst that changed nothing is suppressed.
        assert!(state.settle().is_none());

        std::fs::write(&path, b"v2").unwrap();
        let event = state.settle().expect("changed bytes reported");
        assert_eq!(event.kind, ChangeKind::Modified);
        assert!(event.checksum.is_some());
        // Reported once per change.
        assert!(state.settle().is_none());

        std::fs::remove_file(&path).unwrap();
        let event = state.settle().expect("deletion reported");
        assert_eq!(event.kind, ChangeKind::Deleted);
        assert_eq!(event.checksum, None);
    }

    #[test]
    fn the_last_write_of_a_burst_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");
        std::fs::write(&path, b"v1").unwrap();

        let (tx, rx) = create_event_channel();
        let watcher = WorkbookWatcher::new(tx);
        watcher.watch(&path).unwrap();

        std::fs::write(&path, b"v2").unwrap();
        std::fs::write(&path, b"v3").unwrap();

        // An unlucky scheduler pause between the writes can split the
        // burst in two, so drain and keep the final event.
        let mut last = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("change reported");
        while let Ok(next) = rx.recv_timeout(Duration::from_secs(1)) {
            last = next;
        }

        assert_eq!(last.kind, ChangeKind::Modified);
        assert_eq!(last.checksum, Some(compute_checksum(&path).unwrap()));
        watcher.unwatch(&path).unwrap();
    }
}
