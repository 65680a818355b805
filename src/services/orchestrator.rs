//! Selection completion orchestration.
//!
//! Turns an instruction, the current selection, and the "multiple" flag into
//! the single string that replaces the selection.
//!
//! | Selection | Multiple | Requests | Replacement |
//! |-----------|----------|----------|-------------|
//! | empty | any | 1 (instruction alone) | completion, or `""` |
//! | non-empty | no | 1 (whole selection) | `selection + "\n" + completion` |
//! | non-empty | yes | 1 per line | per line: `line + "\n" + completion + "\n\n"` |
//!
//! Usage is recorded in the history exactly once per run, before any request
//! is issued.

use super::completion::{CompletionOutcome, CompletionRequester, split_chunks};
use super::instruction::InstructionService;
use crate::llm::LlmProvider;
use crate::models::Instruction;
use crate::storage::InstructionStorage;
use crate::{Error, Result};

/// How a selection is sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Nothing selected; the instruction is sent alone.
    Empty,
    /// The whole selection is one chunk.
    Single,
    /// Each line of the selection is its own chunk.
    Multiple,
}

impl SelectionMode {
    /// Picks the mode for a selection and the caller's flag.
    #[must_use]
    pub const fn for_selection(selection: &str, multiple: bool) -> Self {
        if selection.is_empty() {
            Self::Empty
        } else if multiple {
            Self::Multiple
        } else {
            Self::Single
        }
    }
}

/// A completion slot that failed.
#[derive(Debug)]
pub struct SlotFailure {
    /// Zero-based chunk index.
    pub index: usize,
    /// Why the slot failed.
    pub error: Error,
}

/// Result of one orchestrated run.
#[derive(Debug)]
pub struct CompletionReport {
    /// Text that replaces the selection.
    pub replacement: String,
    /// Mode the run used.
    pub mode: SelectionMode,
    /// Number of completion requests issued.
    pub requests: usize,
    /// The history record after bookkeeping, when bookkeeping succeeded.
    pub instruction: Option<Instruction>,
    /// Why bookkeeping failed, if it did.
    pub bookkeeping_error: Option<Error>,
    /// Slots whose request failed.
    pub failures: Vec<SlotFailure>,
}

impl CompletionReport {
    /// Whether any slot or the bookkeeping step failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.bookkeeping_error.is_some()
    }
}

/// Drives bookkeeping, completion requests, and replacement assembly.
pub struct SelectionCompletionOrchestrator<S: InstructionStorage, P: LlmProvider> {
    instructions: InstructionService<S>,
    requester: CompletionRequester<P>,
}

impl<S: InstructionStorage, P: LlmProvider> SelectionCompletionOrchestrator<S, P> {
    /// Creates an orchestrator over a store and a provider.
    #[must_use]
    pub const fn new(storage: S, provider: P) -> Self {
        Self {
            instructions: InstructionService::new(storage),
            requester: CompletionRequester::new(provider),
        }
    }

    /// Creates an orchestrator from already-configured parts.
    #[must_use]
    pub const fn from_parts(
        instructions: InstructionService<S>,
        requester: CompletionRequester<P>,
    ) -> Self {
        Self {
            instructions,
            requester,
        }
    }

    /// Returns the instruction service.
    #[must_use]
    pub const fn instructions(&self) -> &InstructionService<S> {
        &self.instructions
    }

    /// Returns the completion requester.
    #[must_use]
    pub const fn requester(&self) -> &CompletionRequester<P> {
        &self.requester
    }

    /// Runs `instruction` against `selection`.
    ///
    /// Failed slots contribute nothing to the replacement and are listed in
    /// the report. A bookkeeping failure is reported but does not stop the
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the instruction is blank.
    pub fn run(&self, instruction: &str, selection: &str, multiple: bool) -> Result<CompletionReport> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(Error::InvalidInput("instruction is empty".to_string()));
        }

        let (recorded, bookkeeping_error) = match self.instructions.record_usage(instruction) {
            Ok(recorded) => (Some(recorded), None),
            Err(e) => {
                tracing::error!(error = %e, "Failed to record instruction usage");
                (None, Some(e))
            },
        };

        let mode = SelectionMode::for_selection(selection, multiple);
        let (replacement, outcomes) = match mode {
            SelectionMode::Empty => {
                let outcome = self.requester.complete(instruction, "");
                let text = outcome.as_ref().ok().cloned().flatten().unwrap_or_default();
                (text, vec![outcome])
            },
            SelectionMode::Single => {
                let outcome = self.requester.complete(instruction, selection);
                let completion = outcome.as_ref().ok().and_then(Option::as_deref);
                (assemble_single(selection, completion), vec![outcome])
            },
            SelectionMode::Multiple => {
                let chunks = split_chunks(selection);
                let outcomes = self.requester.complete_batch(instruction, &chunks);
                (assemble_multiple(&chunks, &outcomes), outcomes)
            },
        };

        let requests = outcomes.len();
        let failures: Vec<SlotFailure> = outcomes
            .into_iter()
            .enumerate()
            .filter_map(|(index, outcome)| outcome.err().map(|error| SlotFailure { index, error }))
            .collect();

        tracing::info!(
            mode = ?mode,
            requests,
            failed = failures.len(),
            replacement_len = replacement.len(),
            "Selection completion finished"
        );

        Ok(CompletionReport {
            replacement,
            mode,
            requests,
            instruction: recorded,
            bookkeeping_error,
            failures,
        })
    }
}

/// Replacement for a single-chunk run: the selection, then the completion on
/// the next line. Without a completion the selection is left as it was.
#[must_use]
pub fn assemble_single(selection: &str, completion: Option<&str>) -> String {
    completion.map_or_else(
        || selection.to_string(),
        |completion| format!("{selection}\n{completion}"),
    )
}

/// Replacement for a per-line run, in chunk order.
///
/// Slots without a completion (absent or failed) contribute nothing.
#[must_use]
pub fn assemble_multiple(chunks: &[&str], outcomes: &[CompletionOutcome]) -> String {
    chunks
        .iter()
        .zip(outcomes)
        .filter_map(|(chunk, outcome)| {
            let completion = outcome.as_ref().ok()?.as_deref()?;
            Some(if chunk.is_empty() {
                completion.to_string()
            } else {
                format!("{chunk}\n{completion}\n\n")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(text: &str) -> CompletionOutcome {
        Ok(Some(text.to_string()))
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(SelectionMode::for_selection("", true), SelectionMode::Empty);
        assert_eq!(SelectionMode::for_selection("", false), SelectionMode::Empty);
        assert_eq!(SelectionMode::for_selection("x", false), SelectionMode::Single);
        assert_eq!(SelectionMode::for_selection("x", true), SelectionMode::Multiple);
    }

    #[test]
    fn test_assemble_single() {
        assert_eq!(assemble_single("text", Some("done")), "text\ndone");
        assert_eq!(assemble_single("text", None), "text");
    }

    #[test]
    fn test_assemble_multiple() {
        let chunks = ["a", "b", ""];
        let outcomes = vec![ok("A"), ok("B"), ok("tail")];
        assert_eq!(assemble_multiple(&chunks, &outcomes), "a\nA\n\nb\nB\n\ntail");
    }

    #[test]
    fn test_assemble_multiple_skips_missing_slots() {
        let chunks = ["a", "b", "c"];
        let outcomes = vec![
            ok("A"),
            Err(Error::operation("openai_request", "timeout")),
            Ok(None),
        ];
        assert_eq!(assemble_multiple(&chunks, &outcomes), "a\nA\n\n");
    }
}
