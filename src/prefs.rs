//! Persisted scripture view preference.
//!
//! The only state kept outside the URL: which columns the verse table
//! shows and which two translations fill them. Preferences are stored per
//! book in one JSON record:
//!
//! ```json
//! {
//!   "books": {
//!     "titus": { "mode": "left-only", "left_translation": "nkjv", "right_translation": "nlt" }
//!   }
//! }
//! ```
//!
//! [`Preferences`] reads the record lazily, at most once per session, and
//! writes it back on every change. Store failures are logged and otherwise
//! ignored: a broken preference file must never break navigation.

use crate::enhance::columns::ColumnMode;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("failed to access preferences at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid preference record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScripturePreference {
    pub mode: ColumnMode,
    pub left_translation: String,
    pub right_translation: String,
}

impl Default for ScripturePreference {
    fn default() -> Self {
        Self {
            mode: ColumnMode::Both,
            left_translation: "nkjv".to_string(),
            right_translation: "nlt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceRecord {
    pub books: BTreeMap<String, ScripturePreference>,
}

pub trait PreferenceStore {
    fn load(&mut self) -> Result<PreferenceRecord, PrefsError>;
    fn save(&mut self, record: &PreferenceRecord) -> Result<(), PrefsError>;
}

/// Record stored as a pretty-printed JSON file. A missing file is an empty record.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFileStore {
    fn load(&mut self) -> Result<PreferenceRecord, PrefsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PreferenceRecord::default());
            }
            Err(source) => {
                return Err(PrefsError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&mut self, record: &PreferenceRecord) -> Result<(), PrefsError> {
        let io_err = |source: std::io::Error| PrefsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, json).map_err(io_err)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    record: Option<PreferenceRecord>,
    loads: usize,
    saves: usize,
}

/// In-memory store. Clones share state, so a caller can keep a handle to
/// inspect what a [`Preferences`] session read and wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: PreferenceRecord) -> Self {
        let store = Self::default();
        store.state.borrow_mut().record = Some(record);
        store
    }

    pub fn record(&self) -> Option<PreferenceRecord> {
        self.state.borrow().record.clone()
    }

    pub fn loads(&self) -> usize {
        self.state.borrow().loads
    }

    pub fn saves(&self) -> usize {
        self.state.borrow().saves
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&mut self) -> Result<PreferenceRecord, PrefsError> {
        let mut state = self.state.borrow_mut();
        state.loads += 1;
        Ok(state.record.clone().unwrap_or_default())
    }

    fn save(&mut self, record: &PreferenceRecord) -> Result<(), PrefsError> {
        let mut state = self.state.borrow_mut();
        state.saves += 1;
        state.record = Some(record.clone());
        Ok(())
    }
}

/// One session's view of the stored preferences.
pub struct Preferences {
    store: Box<dyn PreferenceStore>,
    record: Option<PreferenceRecord>,
    defaults: ScripturePreference,
}

impl Preferences {
    pub fn new(store: Box<dyn PreferenceStore>, defaults: ScripturePreference) -> Self {
        Self {
            store,
            record: None,
            defaults,
        }
    }

    fn record(&mut self) -> &mut PreferenceRecord {
        if self.record.is_none() {
            let loaded = self.store.load().unwrap_or_else(|e| {
                warn!("ignoring unreadable scripture preferences: {e}");
                PreferenceRecord::default()
            });
            self.record = Some(loaded);
        }
        self.record.get_or_insert_with(PreferenceRecord::default)
    }

    /// Stored preference for `book`, or the configured defaults.
    pub fn for_book(&mut self, book: &str) -> ScripturePreference {
        let defaults = self.defaults.clone();
        self.record().books.get(book).cloned().unwrap_or(defaults)
    }

    /// Update the column mode for `book` and persist the record.
    pub fn set_mode(&mut self, book: &str, mode: ColumnMode) {
        self.update(book, |p| p.mode = mode);
    }

    /// Update both translations shown for `book` and persist the record.
    pub fn set_translations(&mut self, book: &str, left: &str, right: &str) {
        self.update(book, |p| {
            p.left_translation = left.to_string();
            p.right_translation = right.to_string();
        });
    }

    fn update(&mut self, book: &str, change: impl FnOnce(&mut ScripturePreference)) {
        let defaults = self.defaults.clone();
        let record = self.record();
        let entry = record.books.entry(book.to_string()).or_insert(defaults);
        change(entry);
        let snapshot = record.clone();
        if let Err(e) = self.store.save(&snapshot) {
            warn!("failed to save scripture preferences: {e}");
        }
    }
}
