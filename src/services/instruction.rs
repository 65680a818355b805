//! Instruction history service.
//!
//! Wraps a storage backend with the usage-recording protocol and the
//! suggestion search used by the "Find Instruction" actions.

use crate::models::Instruction;
use crate::storage::InstructionStorage;
use crate::{Error, Result};

/// High-level operations over the instruction history.
pub struct InstructionService<S: InstructionStorage> {
    storage: S,
}

impl<S: InstructionStorage> InstructionService<S> {
    /// Creates a service over `storage`.
    #[must_use]
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Returns the storage backend.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Records one use of `text`.
    ///
    /// Surrounding whitespace is ignored so `"Summarize\n"` and `"Summarize"`
    /// share a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for blank text, or the storage error.
    pub fn record_usage(&self, text: &str) -> Result<Instruction> {
        let text = normalize(text)?;
        self.storage.record_usage(text)
    }

    /// Instructions containing `query` (case-insensitive), most used first.
    ///
    /// A history that has not been created yet has no suggestions.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the history exists but cannot be read.
    pub fn suggestions(&self, query: &str, limit: Option<usize>) -> Result<Vec<Instruction>> {
        let collection = match self.storage.load_instructions() {
            Ok(collection) => collection,
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(collection
            .search(query)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

/// Trims `text` and rejects blank instructions.
fn normalize(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("instruction is empty".to_string()));
    }
    Ok(trimmed)
}
