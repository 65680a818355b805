//! # Instruct
//!
//! Run reusable instructions against selected text with a hosted language model.
//!
//! Instruct keeps a frequency-ranked history of the instructions you use, sends
//! an instruction plus the current selection to a chat-completion API, and
//! splices the returned text back into the document.
//!
//! ## Features
//!
//! - JSON instruction history with case-insensitive lookup and usage counts
//! - Single-writer store access (no lost updates between concurrent actions)
//! - Per-line fan-out of completion requests in "multiple" mode
//! - Pluggable LLM providers behind [`LlmProvider`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use instruct::{FileInstructionStore, OpenAiClient, SelectionCompletionOrchestrator};
//!
//! let store = FileInstructionStore::open("instructions.json")?;
//! let orchestrator = SelectionCompletionOrchestrator::new(store, OpenAiClient::new());
//! let report = orchestrator.run("Summarize", "Long text...", false)?;
//! println!("{}", report.replacement);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod document;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{InstructConfig, LlmConfig, Model};
pub use document::{Document, FileDocument, FileSelection, LineRange, StdinDocument};
pub use llm::{LlmProvider, OpenAiClient};
pub use models::{Instruction, InstructionCollection, InstructionId};
pub use services::{
    CompletionOutcome, CompletionReport, CompletionRequester, InstructionService,
    SelectionCompletionOrchestrator, SlotFailure,
};
pub use storage::{FileInstructionStore, InstructionStorage};

/// Error type for instruct operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty instruction, malformed line range, bad config value |
/// | `NotFound` | Store document missing, unknown instruction id |
/// | `NoActiveDocument` | No file given and stdin is a terminal |
/// | `OperationFailed` | File I/O, JSON, or HTTP failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A requested entity does not exist.
    ///
    /// Raised when:
    /// - The instruction document has not been created yet
    /// - `update_instruction` is called with an id the store does not hold
    #[error("not found: {0}")]
    NotFound(String),

    /// There is no document to read a selection from.
    #[error("no active document")]
    NoActiveDocument,

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for instruct operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty instruction".to_string());
        assert_eq!(err.to_string(), "invalid input: empty instruction");

        let err = Error::operation("write_instructions", "disk full");
        assert_eq!(
            err.to_string(),
            "operation 'write_instructions' failed: disk full"
        );

        let err = Error::NotFound("instruction id 42".to_string());
        assert_eq!(err.to_string(), "not found: instruction id 42");

        assert_eq!(Error::NoActiveDocument.to_string(), "no active document");
    }

    #[test]
    fn test_current_timestamp_millis() {
        let ts = current_timestamp_millis();
        // After 2020-01-01 in milliseconds
        assert!(ts > 1_577_836_800_000);
    }
}
