//! Snapshot persistence seam.
//!
//! The machine writes the full session after every transition through this
//! trait; platform layers decide where the bytes go. Snapshots are keyed by
//! a single session slot — there is no multi-session namespace.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::session::SessionState;

/// Trait for abstracting snapshot save/load operations.
/// Platform-specific implementations should provide this.
pub trait SnapshotStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist the session synchronously. Must complete before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    fn save(&self, slot: &str, state: &SessionState) -> Result<(), Self::Error>;

    /// Load the persisted session, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored session cannot be read or parsed.
    fn load(&self, slot: &str) -> Result<Option<SessionState>, Self::Error>;

    /// Delete the persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be deleted.
    fn delete(&self, slot: &str) -> Result<(), Self::Error>;
}

/// In-memory store backed by serialized JSON text. Used by tests and the
/// headless tester; the text backing makes byte-for-byte restore checks
/// straightforward.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored JSON for a slot, if present.
    #[must_use]
    pub fn raw(&self, slot: &str) -> Option<String> {
        self.slots.borrow().get(slot).cloned()
    }
}

impl SnapshotStore for MemoryStore {
    type Error = serde_json::Error;

    fn save(&self, slot: &str, state: &SessionState) -> Result<(), Self::Error> {
        let json = serde_json::to_string(state)?;
        self.slots.borrow_mut().insert(slot.to_string(), json);
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<SessionState>, Self::Error> {
        self.slots
            .borrow()
            .get(slot)
            .map(|json| serde_json::from_str(json))
            .transpose()
    }

    fn delete(&self, slot: &str) -> Result<(), Self::Error> {
        self.slots.borrow_mut().remove(slot);
        Ok(())
    }
}

/// Errors raised by the file-backed store.
#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("snapshot io: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed store writing one JSON file per slot under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SnapshotStore for FileStore {
    type Error = FileStoreError;

    fn save(&self, slot: &str, state: &SessionState) -> Result<(), Self::Error> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string(state)?;
        fs::write(self.slot_path(slot), json)?;
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<SessionState>, Self::Error> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn delete(&self, slot: &str) -> Result<(), Self::Error> {
        let path = self.slot_path(slot);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
