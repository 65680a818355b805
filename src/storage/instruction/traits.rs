//! Instruction storage trait definition.

use crate::Result;
use crate::models::{Instruction, InstructionCollection};

/// Trait for instruction history backends.
pub trait InstructionStorage: Send + Sync {
    /// Loads the whole collection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the backing document does not
    /// exist, or an operation error if it cannot be read or parsed.
    fn load_instructions(&self) -> Result<InstructionCollection>;

    /// Finds the first instruction whose text equals `text`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be loaded.
    fn find_instruction(&self, text: &str) -> Result<Option<Instruction>>;

    /// Appends a new instruction with a fresh id and `usage_count = 1`.
    ///
    /// # Returns
    ///
    /// The stored instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    fn append_instruction(&self, text: &str) -> Result<Instruction>;

    /// Replaces the stored instruction that has the same id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no instruction has that id, or an
    /// operation error if the document cannot be persisted.
    fn update_instruction(&self, instruction: &Instruction) -> Result<()>;

    /// Records one use of `text`: bumps the matching instruction's usage count,
    /// or appends a new instruction when none matches.
    ///
    /// Find and update must happen under one lock so concurrent callers never
    /// lose an increment.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be loaded or persisted.
    fn record_usage(&self, text: &str) -> Result<Instruction>;
}
