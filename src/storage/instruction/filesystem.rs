//! Filesystem-backed instruction storage.
//!
//! Stores the whole history as one JSON file. Every call re-reads the file, so
//! the file stays the single source of truth; there is no cache across calls.
//!
//! # Concurrency
//!
//! All stores opened on the same path share one lock (see [`path_lock`]), so a
//! read-modify-write such as [`InstructionStorage::record_usage`] cannot lose
//! an update to another caller in the same process. Writes go to a sibling
//! temporary file that is renamed over the document, so a crash mid-write
//! leaves the previous document intact.

use super::InstructionStorage;
use crate::current_timestamp_millis;
use crate::models::{Instruction, InstructionCollection};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

/// Default file name for the history document.
pub const DEFAULT_FILE_NAME: &str = "instructions.json";

/// Process-wide registry of per-path locks.
static PATH_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Returns the lock shared by every store opened on `path`.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    // A poisoned registry only means another thread panicked while inserting;
    // the map itself is still usable.
    let mut locks = PATH_LOCKS
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

/// Filesystem-based instruction storage.
pub struct FileInstructionStore {
    /// Path of the JSON document.
    path: PathBuf,
    /// Single-writer lock shared with other stores on the same path.
    lock: Arc<Mutex<()>>,
}

impl FileInstructionStore {
    /// Creates a store for `path` without touching the filesystem.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = path_lock(&path);
        Self { path, lock }
    }

    /// Creates a store and makes sure the document exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or the empty document cannot
    /// be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.ensure_initialized()?;
        Ok(store)
    }

    /// Returns the default history path.
    ///
    /// Returns `<data dir>/instruct/instructions.json`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|d| d.data_dir().join("instruct").join(DEFAULT_FILE_NAME))
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes an empty collection if the document does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn ensure_initialized(&self) -> Result<()> {
        let _guard = self.acquire()?;
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_instruction_dir", e))?;
        }
        tracing::info!(path = %self.path.display(), "Creating instruction history");
        self.write_unlocked(&InstructionCollection::new())
    }

    fn acquire(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| Error::operation("lock_instructions", e))
    }

    /// Reads and parses the document. Caller holds the lock.
    fn read_unlocked(&self) -> Result<InstructionCollection> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Instruction history not found");
                return Err(Error::NotFound(format!(
                    "instruction history at {}",
                    self.path.display()
                )));
            },
            Err(e) => return Err(Error::operation("read_instructions", e)),
        };

        serde_json::from_str(&content).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Malformed instruction history");
            Error::operation("parse_instructions", e)
        })
    }

    /// Reads the document, treating a missing file as an empty collection.
    fn read_or_empty_unlocked(&self) -> Result<InstructionCollection> {
        match self.read_unlocked() {
            Err(Error::NotFound(_)) => Ok(InstructionCollection::new()),
            other => other,
        }
    }

    /// Serializes and atomically replaces the document. Caller holds the lock.
    fn write_unlocked(&self, collection: &InstructionCollection) -> Result<()> {
        let content = to_pretty_json(collection)?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| DEFAULT_FILE_NAME.into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, content).map_err(|e| Error::operation("write_instructions", e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Error::operation("replace_instructions", e)
        })?;

        tracing::debug!(
            path = %self.path.display(),
            count = collection.len(),
            "Wrote instruction history"
        );
        Ok(())
    }

    fn append_unlocked(&self, text: &str) -> Result<Instruction> {
        let mut collection = self.read_or_empty_unlocked()?;
        let instruction = Instruction::new(collection.next_id(current_timestamp_millis()), text);
        collection.instructions.push(instruction.clone());
        self.write_unlocked(&collection)?;
        metrics::counter!("instructions_created_total").increment(1);
        Ok(instruction)
    }

    fn update_unlocked(&self, instruction: &Instruction) -> Result<()> {
        let mut collection = self.read_unlocked()?;
        let index = collection
            .position_of(instruction.id)
            .ok_or_else(|| Error::NotFound(format!("instruction id {}", instruction.id)))?;
        collection.instructions[index] = instruction.clone();
        self.write_unlocked(&collection)
    }
}

/// Serializes with 4-space indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| Error::operation("serialize_instructions", e))?;
    buf.push(b'\n');
    Ok(buf)
}

impl InstructionStorage for FileInstructionStore {
    fn load_instructions(&self) -> Result<InstructionCollection> {
        let _guard = self.acquire()?;
        self.read_unlocked()
    }

    fn find_instruction(&self, text: &str) -> Result<Option<Instruction>> {
        let _guard = self.acquire()?;
        let collection = self.read_or_empty_unlocked()?;
        Ok(collection.find_by_text(text).cloned())
    }

    fn append_instruction(&self, text: &str) -> Result<Instruction> {
        let _guard = self.acquire()?;
        self.append_unlocked(text)
    }

    fn update_instruction(&self, instruction: &Instruction) -> Result<()> {
        let _guard = self.acquire()?;
        self.update_unlocked(instruction)
    }

    fn record_usage(&self, text: &str) -> Result<Instruction> {
        let _guard = self.acquire()?;
        let existing = self.read_or_empty_unlocked()?.find_by_text(text).cloned();
        let recorded = match existing {
            Some(existing) => {
                let updated = existing.with_usage_incremented();
                self.update_unlocked(&updated)?;
                updated
            },
            None => self.append_unlocked(text)?,
        };
        tracing::info!(
            id = %recorded.id,
            usage_count = recorded.usage_count,
            "Recorded instruction usage"
        );
        Ok(recorded)
    }
}
