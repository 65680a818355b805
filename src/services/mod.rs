//! Business logic services.
//!
//! Services combine the instruction store and the LLM provider into the
//! operations exposed by the CLI.

mod completion;
mod instruction;
mod orchestrator;

pub use completion::{
    CompletionOutcome, CompletionRequester, PROMPT_DELIMITER, build_prompt, split_chunks,
};
pub use instruction::InstructionService;
pub use orchestrator::{
    CompletionReport, SelectionCompletionOrchestrator, SelectionMode, SlotFailure,
    assemble_multiple, assemble_single,
};
